use serde::Deserialize;
use squall_core::error::SquallError;
use squall_core::{Instance, InstanceProvider, InstanceStatus};
use tracing::debug;

const BASE_URL: &str = "https://cloud.lambda.ai/api/v1/";

/// Tag naming the cluster an instance was launched for. Instances without
/// it fall back to their instance name.
pub const GROUP_TAG_KEY: &str = "squall-cluster";

pub struct Lambda {
    pub api_key: String,
    pub region: String,
    pub base_url: String,
}

#[derive(Deserialize)]
struct ListResponse {
    data: Vec<InstanceData>,
}

#[derive(Deserialize)]
struct InstanceData {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ip: Option<String>,
    status: String,
    #[serde(default)]
    region: Option<RegionData>,
    #[serde(default)]
    tags: Vec<TagData>,
}

#[derive(Deserialize)]
struct RegionData {
    name: String,
}

#[derive(Deserialize)]
struct TagData {
    key: String,
    value: String,
}

impl InstanceProvider for Lambda {
    fn list_instances(&self) -> Result<Vec<Instance>, SquallError> {
        let client = reqwest::blocking::Client::new();

        let url = format!("{}instances", self.base_url);

        let response = client.get(&url)
            .basic_auth(&self.api_key, None::<&str>)
            .header("accept", "application/json")
            .send()
            .map_err(|e| SquallError::Provider(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(SquallError::Provider(format!("API Error ({}): {}", status, text)));
        }

        let response_text = response.text()
            .map_err(|e| SquallError::Provider(format!("Failed to read response body: {}", e)))?;

        let instances = parse_instances(&response_text, &self.region)?;
        debug!(region = %self.region, count = instances.len(), "listed lambda instances");
        Ok(instances)
    }

    fn get_user(&self) -> Result<String, SquallError> {
        Ok("ubuntu".to_string())
    }
}

/// Parse an instance listing, keeping only instances in `region`.
/// Instances that report no region are kept.
pub fn parse_instances(body: &str, region: &str) -> Result<Vec<Instance>, SquallError> {
    let listing: ListResponse = serde_json::from_str(body)
        .map_err(|e| SquallError::Provider(format!("Failed to parse response: {} - Response body: {}", e, body)))?;

    let instances = listing.data.into_iter()
        .filter(|data| data.region.as_ref().is_none_or(|r| r.name == region))
        .map(|data| {
            let mut instance = Instance::new(data.id, InstanceStatus::parse(&data.status));
            for tag in data.tags {
                instance.tags.insert(tag.key, tag.value);
            }
            instance.group = instance.tags.get(GROUP_TAG_KEY).cloned().or(data.name);
            instance.address = data.ip;
            instance
        })
        .collect();

    Ok(instances)
}

impl Lambda {
    pub fn new(api_key: String, region: String, endpoint: Option<String>) -> Lambda {
        let mut base_url = endpoint.unwrap_or_else(|| BASE_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Lambda {
            api_key,
            region,
            base_url,
        }
    }
}
