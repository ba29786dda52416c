//! Log filter setup

use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::error::Error;
use crate::Result;

/// Level used when `RUST_LOG` is unset, matching `EnvFilter::from_default_env`
const DEFAULT_DIRECTIVE: &str = "error";

const VERBOSE_DIRECTIVES: [&str; 2] = ["multimodal_agent=debug", "mmagent=debug"];

/// Build the subscriber filter from `RUST_LOG` and the `--verbose` flag.
///
/// `--verbose` adds debug output for this crate on top of whatever `RUST_LOG`
/// asks for. Unparsable `RUST_LOG` directives are skipped.
pub fn build_filter(env: Option<&str>, verbose: bool) -> Result<EnvFilter> {
    let base = env.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(DEFAULT_DIRECTIVE);
    let mut filter = EnvFilter::builder().parse_lossy(base);

    if verbose {
        for directive in VERBOSE_DIRECTIVES {
            let directive: Directive = directive
                .parse()
                .map_err(|e| Error::Config(format!("Invalid log directive {}: {}", directive, e)))?;
            filter = filter.add_directive(directive);
        }
    }

    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_keeps_rust_log() {
        let filter = build_filter(Some("hyper=info"), true).unwrap().to_string();
        assert!(filter.contains("hyper=info"));
        assert!(filter.contains("multimodal_agent=debug"));
        assert!(filter.contains("mmagent=debug"));
    }

    #[test]
    fn test_rust_log_alone() {
        let filter = build_filter(Some("reqwest=trace"), false).unwrap().to_string();
        assert!(filter.contains("reqwest=trace"));
        assert!(!filter.contains("multimodal_agent"));
    }

    #[test]
    fn test_default_without_env() {
        assert_eq!(build_filter(None, false).unwrap().to_string(), "error");
        assert_eq!(build_filter(Some("  "), false).unwrap().to_string(), "error");

        let verbose = build_filter(None, true).unwrap().to_string();
        assert!(verbose.contains("error"));
        assert!(verbose.contains("mmagent=debug"));
    }
}
