//! Name-based calls: `authenticate_and_set_<type>` and `current_<type>`.
//!
//! Lets hosts that route by method name (scripting bridges, GraphQL
//! resolvers keyed by field name) reach the generic pipeline for any
//! configured resource type. Names that do not follow the convention are
//! reported as undefined so the host can apply its own fallback.

use std::sync::Arc;

use super::AuthError;
use super::context::AuthContext;
use super::pipeline::AuthPipeline;
use crate::models::Account;

const AUTHENTICATE_PREFIX: &str = "authenticate_and_set_";
const CURRENT_PREFIX: &str = "current_";

/// A parsed name-based call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardCall<'a> {
    AuthenticateAndSet(&'a str),
    Current(&'a str),
}

impl<'a> GuardCall<'a> {
    /// `None` for names outside the convention or with an empty type.
    pub fn parse(name: &'a str) -> Option<Self> {
        if let Some(resource_type) = name.strip_prefix(AUTHENTICATE_PREFIX) {
            return (!resource_type.is_empty()).then_some(GuardCall::AuthenticateAndSet(resource_type));
        }
        if let Some(resource_type) = name.strip_prefix(CURRENT_PREFIX) {
            return (!resource_type.is_empty()).then_some(GuardCall::Current(resource_type));
        }
        None
    }

    pub fn resource_type(&self) -> &'a str {
        match self {
            GuardCall::AuthenticateAndSet(t) | GuardCall::Current(t) => t,
        }
    }
}

impl AuthPipeline {
    /// Whether `name` is a call this pipeline answers.
    pub fn responds_to(&self, name: &str) -> bool {
        GuardCall::parse(name).is_some_and(|call| self.registry().contains(call.resource_type()))
    }

    /// Route a name-based call.
    ///
    /// `authenticate_and_set_<type>` runs the pipeline and returns the bound
    /// account; `current_<type>` returns the binding, if any. Unknown names
    /// and unconfigured types yield `UndefinedMethod`.
    pub async fn call(
        &self,
        ctx: &mut AuthContext,
        name: &str,
    ) -> Result<Option<Arc<Account>>, AuthError> {
        let call = GuardCall::parse(name)
            .filter(|call| self.registry().contains(call.resource_type()))
            .ok_or_else(|| AuthError::UndefinedMethod(name.to_string()))?;

        match call {
            GuardCall::AuthenticateAndSet(resource_type) => self
                .authenticate_and_set(ctx, resource_type)
                .await
                .map(Some),
            GuardCall::Current(resource_type) => Ok(ctx.current_resource(resource_type).cloned()),
        }
    }
}
