use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::model::{EndpointConfig, EndpointSecurity, Environment, SecurityBlock};
use crate::vault::CredentialVault;

/// Decides, per backend environment, whether to encrypt a newly supplied
/// secret or retain the previously stored ciphertext. Produces a new config;
/// the incoming and stored blocks are never mutated.
pub struct CredentialMigrator;

impl CredentialMigrator {
    pub fn migrate(
        vault: &dyn CredentialVault,
        incoming: Option<EndpointConfig>,
        previous: Option<&EndpointConfig>,
    ) -> Result<Option<EndpointConfig>> {
        let Some(mut config) = incoming else {
            return Ok(None);
        };
        let Some(security) = config.security.take() else {
            return Ok(Some(config));
        };

        let previous_security = previous.and_then(|c| c.security.as_ref());
        let production = security
            .production
            .map(|block| {
                Self::migrate_block(
                    vault,
                    block,
                    previous_security.and_then(|s| s.block(Environment::Production)),
                    Environment::Production,
                )
            })
            .transpose()?;
        let sandbox = security
            .sandbox
            .map(|block| {
                Self::migrate_block(
                    vault,
                    block,
                    previous_security.and_then(|s| s.block(Environment::Sandbox)),
                    Environment::Sandbox,
                )
            })
            .transpose()?;

        config.security = Some(EndpointSecurity {
            production,
            sandbox,
        });
        Ok(Some(config))
    }

    fn migrate_block(
        vault: &dyn CredentialVault,
        block: SecurityBlock,
        previous: Option<&SecurityBlock>,
        environment: Environment,
    ) -> Result<SecurityBlock> {
        let custom_parameters = Some(Self::normalize_custom_parameters(
            block.custom_parameters.as_ref(),
        )?);

        let previous_cipher = previous.and_then(|p| p.client_secret.as_deref());
        let client_secret = if !block.kind.requires_secret() {
            block.client_secret.clone()
        } else {
            match block.client_secret.as_deref().map(str::trim) {
                // A request echoing the stored ciphertext is not a new
                // credential; re-encrypting it would stack encryption layers.
                Some(secret) if !secret.is_empty() && Some(secret) == previous_cipher => {
                    Some(secret.to_string())
                }
                Some(secret) if !secret.is_empty() => Some(
                    vault
                        .encrypt(secret)
                        .map_err(|e| EngineError::EndpointCrypto(e.to_string()))?,
                ),
                _ => match previous_cipher {
                    Some(prior) if !prior.trim().is_empty() => Some(prior.to_string()),
                    _ => return Err(EngineError::InvalidEndpointCredentials { environment }),
                },
            }
        };

        Ok(SecurityBlock {
            kind: block.kind,
            client_id: block.client_id,
            client_secret,
            token_url: block.token_url,
            custom_parameters,
        })
    }

    /// Custom parameters are persisted in a single string-encoded form: an
    /// object is serialized, an existing string kept as is, absence becomes
    /// the empty object.
    fn normalize_custom_parameters(value: Option<&Value>) -> Result<Value> {
        match value {
            None | Some(Value::Null) => Ok(Value::String("{}".to_string())),
            Some(Value::String(s)) => Ok(Value::String(s.clone())),
            Some(other) => serde_json::to_string(other)
                .map(Value::String)
                .map_err(|e| EngineError::Internal(e.to_string())),
        }
    }
}
