//! Azure Resource Manager implementation of the provider traits

pub mod client;
pub mod credential;

pub use client::{AzureClient, MANAGEMENT_SCOPE, SQL_API_VERSION, WEB_API_VERSION};
pub use credential::{
    AzureCliCredential, ChainedCredential, EnvironmentCredential, StaticTokenCredential,
    default_credential,
};
