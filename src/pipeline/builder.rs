//! Construction and customization of a [`Pipeline`].

use std::sync::Arc;

use crate::error::ConfigError;
use crate::pipeline::{Middleware, Pipeline, Stage};
use crate::transport::Transport;

/// Builder for a [`Pipeline`].
///
/// Positional operations address an existing middleware by name. Problems
/// (an unknown anchor, a duplicate name) are recorded and reported by
/// [`PipelineBuilder::build`]; the first one wins and later operations are
/// skipped.
///
/// # Examples
///
/// ```rust
/// use retryline::retry::RetryPolicy;
/// use retryline::pipeline::ClientRequestId;
/// use retryline::testing::{ScriptStep, ScriptedTransport};
/// use retryline::{ConfigError, Pipeline};
///
/// let transport = ScriptedTransport::always(ScriptStep::ok());
/// let pipeline = Pipeline::builder(transport)
///     .with("retry", RetryPolicy::default())
///     .insert_before("retry", "client-request-id", ClientRequestId::new())
///     .build()
///     .unwrap();
/// assert_eq!(pipeline.middleware_names(), vec!["client-request-id", "retry"]);
///
/// let err = pipeline
///     .to_builder()
///     .insert_after("missing", "extra", ClientRequestId::new())
///     .build()
///     .unwrap_err();
/// assert_eq!(err, ConfigError::UnknownMiddleware { name: "missing".into() });
/// ```
pub struct PipelineBuilder {
    stages: Vec<Stage>,
    transport: Arc<dyn Transport>,
    error: Option<ConfigError>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        Self::from_stages(Vec::new(), transport)
    }

    pub(crate) fn from_stages(stages: Vec<Stage>, transport: Arc<dyn Transport>) -> Self {
        Self {
            stages,
            transport,
            error: None,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|stage| stage.name == name)
    }

    fn apply(mut self, op: impl FnOnce(&mut Self) -> Result<(), ConfigError>) -> Self {
        if self.error.is_none() {
            if let Err(err) = op(&mut self) {
                self.error = Some(err);
            }
        }
        self
    }

    fn stage(&self, name: &str, middleware: Arc<dyn Middleware>) -> Result<Stage, ConfigError> {
        if self.position(name).is_some() {
            return Err(ConfigError::DuplicateMiddleware {
                name: name.to_owned(),
            });
        }
        Ok(Stage {
            name: name.to_owned(),
            middleware,
        })
    }

    fn anchor(&self, name: &str) -> Result<usize, ConfigError> {
        self.position(name)
            .ok_or_else(|| ConfigError::UnknownMiddleware {
                name: name.to_owned(),
            })
    }

    /// Append `middleware` as the innermost stage so far.
    pub fn with(self, name: &str, middleware: impl Middleware + 'static) -> Self {
        self.apply(|builder| {
            let stage = builder.stage(name, Arc::new(middleware))?;
            builder.stages.push(stage);
            Ok(())
        })
    }

    /// Insert `middleware` directly outside the stage named `anchor`.
    pub fn insert_before(
        self,
        anchor: &str,
        name: &str,
        middleware: impl Middleware + 'static,
    ) -> Self {
        self.apply(|builder| {
            let idx = builder.anchor(anchor)?;
            let stage = builder.stage(name, Arc::new(middleware))?;
            builder.stages.insert(idx, stage);
            Ok(())
        })
    }

    /// Insert `middleware` directly inside the stage named `anchor`.
    pub fn insert_after(
        self,
        anchor: &str,
        name: &str,
        middleware: impl Middleware + 'static,
    ) -> Self {
        self.apply(|builder| {
            let idx = builder.anchor(anchor)?;
            let stage = builder.stage(name, Arc::new(middleware))?;
            builder.stages.insert(idx + 1, stage);
            Ok(())
        })
    }

    /// Swap the middleware of the stage named `name`, keeping its position.
    pub fn replace(self, name: &str, middleware: impl Middleware + 'static) -> Self {
        self.apply(|builder| {
            let idx = builder.anchor(name)?;
            builder.stages[idx].middleware = Arc::new(middleware);
            Ok(())
        })
    }

    /// Drop the stage named `name`.
    pub fn remove(self, name: &str) -> Self {
        self.apply(|builder| {
            let idx = builder.anchor(name)?;
            builder.stages.remove(idx);
            Ok(())
        })
    }

    /// Finish the chain.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(Pipeline::from_parts(self.stages, self.transport)),
        }
    }
}
