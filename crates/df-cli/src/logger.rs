//! Logging setup for the `log` facade

use log::LevelFilter;

/// Level used for a given `--verbose` setting
fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Log to stderr at the `--verbose` level. `RUST_LOG` overrides it.
pub(crate) fn init(verbose: bool) {
    env_logger::Builder::new()
        .filter_level(level_for(verbose))
        .parse_default_env()
        .init();
}
