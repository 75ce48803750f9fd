//! Configuration types for CLI verbosity and options.

use tracing::Level;

/// Runtime configuration derived from CLI arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Controls the verbosity level of CLI output.
    pub verbosity: Verbosity,
}

impl Config {
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Log level used when `RUST_LOG` is not set.
    ///
    /// Quiet runs still surface warnings so failed checks are not silent.
    #[must_use]
    pub fn default_log_level(&self) -> Level {
        match self.verbosity {
            Verbosity::Quiet => Level::WARN,
            Verbosity::Normal => Level::INFO,
            Verbosity::Verbose => Level::DEBUG,
        }
    }
}

/// Verbosity level for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    /// Resolves the `--quiet` / `--verbose` flag pair; quiet wins.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_quiet_and_verbose_flags() {
        let quiet = Config {
            verbosity: Verbosity::Quiet,
        };
        assert!(quiet.is_quiet());
        assert!(!quiet.is_verbose());

        let verbose = Config {
            verbosity: Verbosity::Verbose,
        };
        assert!(!verbose.is_quiet());
        assert!(verbose.is_verbose());
    }

    #[test]
    fn test_default_log_level_follows_verbosity() {
        let level = |verbosity| Config { verbosity }.default_log_level();
        assert_eq!(level(Verbosity::Quiet), Level::WARN);
        assert_eq!(level(Verbosity::Normal), Level::INFO);
        assert_eq!(level(Verbosity::Verbose), Level::DEBUG);
    }

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
    }
}
