/*
 * Copyright 2026 sukawasatoru
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use url::Url;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";

/// Runtime settings shared by every request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChatConfig {
    /// Credential for the completion service. `None` fails every request with a configuration
    /// error.
    pub api_key: Option<String>,
    pub organization_id: Option<String>,
    /// File ID of the reference dataset.
    pub data_file_id: Option<String>,
    pub base_url: Url,
}

impl ChatConfig {
    pub fn new(
        api_key: Option<String>,
        organization_id: Option<String>,
        data_file_id: Option<String>,
        mut base_url: Url,
    ) -> Self {
        // `Url::join` drops the last segment without the trailing slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            api_key: non_blank(api_key),
            organization_id: non_blank(organization_id),
            data_file_id: non_blank(data_file_id),
            base_url,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|data| !data.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_absent() {
        let config = ChatConfig::new(
            Some("".into()),
            Some("  ".into()),
            Some("file-abc".into()),
            DEFAULT_OPENAI_BASE_URL.parse().unwrap(),
        );
        assert_eq!(config.api_key, None);
        assert_eq!(config.organization_id, None);
        assert_eq!(config.data_file_id.as_deref(), Some("file-abc"));
    }

    #[test]
    fn base_url_trailing_slash() {
        let config = ChatConfig::new(None, None, None, "http://127.0.0.1:8080/v1".parse().unwrap());
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8080/v1/");

        let config = ChatConfig::new(None, None, None, DEFAULT_OPENAI_BASE_URL.parse().unwrap());
        assert_eq!(config.base_url.as_str(), DEFAULT_OPENAI_BASE_URL);
    }
}
