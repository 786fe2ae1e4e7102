use squall_core::error::SquallError;
use squall_core::{InstanceProvider, ProviderConfig};
use squall_lambda::Lambda;

pub fn create_provider_handle(provider_name: &str, provider_config: &ProviderConfig) -> Result<Box<dyn InstanceProvider>, SquallError> {
    match provider_name {
        "lambda" => {
            let api_key = provider_config.api_key
                .as_ref()
                .ok_or_else(|| SquallError::Config("api-key is required for lambda provider, set it in your squall config".into()))?
                .clone();
            let region = provider_config.region
                .as_ref()
                .ok_or_else(|| SquallError::Config("region is required for lambda provider, set it in your squall config".into()))?
                .clone();

            Ok(Box::new(Lambda::new(api_key, region, provider_config.endpoint.clone())))
        }
        _ => Err(SquallError::Config(format!("Unimplemented provider: {}", provider_name)))
    }
}
