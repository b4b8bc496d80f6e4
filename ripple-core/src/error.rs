//! Error types.
//!
//! Most runtime failures in Ripple are *usage diagnostics*: the offending
//! operation is skipped, a warning is logged, and the caller gets an `Err`
//! back where there is a return channel. Failures inside user code (a render
//! function or watch callback that panics) are not represented here; they
//! unwind through the effect and the scheduler flush.

use thiserror::Error;

/// Errors reported by the reactivity engine and the renderer.
#[derive(Debug, Error)]
pub enum Error {
    /// A computed value without a setter was written to.
    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    /// A component tried to mutate one of its own props.
    #[error("attempting to mutate prop \"{key}\"; props are readonly")]
    ReadonlyProp {
        /// Name of the prop.
        key: String,
    },

    /// The `data` option was supplied as a plain value instead of a factory.
    #[error("the data option of component {component:?} must be a function")]
    DataNotFunction {
        /// Component name, if it has one.
        component: Option<String>,
    },

    /// Jobs kept re-queueing themselves past the configured batch limit.
    #[error("maximum recursive updates exceeded: more than {limit} flush batches in one flush")]
    FlushLimitExceeded {
        /// The configured `max_flush_batches`.
        limit: usize,
    },

    /// `Renderer::render_to` could not resolve its target container.
    #[error("no host node matches selector {selector:?}")]
    ContainerNotFound {
        /// The selector passed to the host.
        selector: String,
    },

    /// `EffectScope::try_run` was called on a stopped scope.
    #[error("cannot run an inactive effect scope")]
    InactiveScope,

    /// Configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readonly_prop_message_names_the_key() {
        let err = Error::ReadonlyProp { key: "title".into() };
        assert_eq!(
            err.to_string(),
            "attempting to mutate prop \"title\"; props are readonly"
        );
    }

    #[test]
    fn config_errors_convert_from_serde() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Config(_)));
    }
}
