#![allow(dead_code)]
pub mod sqlite;

use rand::distr::{Distribution, slice::Choose};

fn gen_database_name() -> String {
    let chars = [
        'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
        's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    ];
    let chars_dist = Choose::new(&chars).unwrap();
    return chars_dist.sample_iter(&mut rand::rng()).take(10).collect();
}
