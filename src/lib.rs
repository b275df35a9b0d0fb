pub mod args;
pub mod error;
pub mod identity_map;
pub mod principals;
pub mod registry;
pub mod report;
pub mod stores;
pub mod table_transfer;
pub mod uri;

use anyhow::Context;
use tracing::{error, info};

use crate::args::Args;
use crate::identity_map::IdentityMap;
use crate::registry::Registry;
use crate::report::RunReport;
use crate::table_transfer::TableTransferer;

/// Runs a full migration: principals first, then every requested table in
/// dependency order, then reconciliation. Only a failure to connect aborts;
/// everything else ends up in the returned report.
pub fn run(args: &Args) -> anyhow::Result<RunReport> {
    let mut source = args.create_source()?;
    let mut dest = args.create_dest()?;
    let registry = Registry::campaign();
    let tables = if args.table.is_empty() {
        registry.tables().to_vec()
    } else {
        registry.subset(&args.table)?
    };

    let mut report = RunReport::new();
    let mut identity_map = IdentityMap::new();
    if args.skip_principals {
        info!("Skipping principal import");
    } else {
        let outcome = principals::import_principals(
            &mut *source,
            &mut *dest,
            &mut identity_map,
            args.fetch_page_size,
        );
        report.principals = Some(outcome);
    }

    if args.disable_constraints {
        dest.set_referential_integrity(false)
            .context("Failed to disable referential integrity on the destination")?;
    }
    {
        let mut transferer =
            TableTransferer::new(&mut *source, &mut *dest, &identity_map, args);
        for spec in &tables {
            info!("Transferring table {}", spec.name);
            report.push(transferer.transfer_table(spec));
        }
    }
    if args.disable_constraints {
        if let Err(err) = dest.set_referential_integrity(true) {
            error!("Failed to restore referential integrity on the destination: {err:#}");
        }
    }

    report.reconcile(&mut *dest);
    return Ok(report);
}
