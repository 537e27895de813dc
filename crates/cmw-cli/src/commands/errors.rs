use super::{load_config, state_path, StateArgs};
use anyhow::Result;
use cmw_report::{write_error_log, write_error_totals};
use cmw_state::StateStore;

/// Print the error log (or its totals) from the state file as CSV.
pub fn print(args: &StateArgs, totals: bool) -> Result<()> {
    let (_loaded, cfg) = load_config(&args.config_paths)?;
    let store = StateStore::new(state_path(&cfg, args.datafile.as_ref()));

    let Some(state) = store.try_load()? else {
        eprintln!("no state file at {}", store.path().display());
        return Ok(());
    };

    let stdout = std::io::stdout();
    if totals {
        write_error_totals(&state, stdout.lock())
    } else {
        write_error_log(&state, stdout.lock())
    }
}
