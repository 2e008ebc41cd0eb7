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

use clap::Parser;
use nutritrack::feature::logging::LoggingBuilder;
use nutritrack::prelude::*;
use nutritrack_chat::config::{ChatConfig, DEFAULT_OPENAI_BASE_URL};
use nutritrack_chat::data::dataset_cache::{DatasetCache, GetDatasetCache};
use nutritrack_chat::data::openai::{GetChatCompletionDataSource, GetFileDataSource, OpenAiClient};
use nutritrack_chat::feature::chat::{GetChatConfig, create_router};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use url::Url;

/// Chat endpoint of the NutriTrack nutrition assistant
#[derive(Parser)]
struct Opt {
    /// API Key for Open AI - https://platform.openai.com/account/api-keys
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Organization ID for Open AI - https://platform.openai.com/account/org-settings
    #[arg(long, env = "OPENAI_ORG_ID")]
    organization_id: Option<String>,

    /// File ID of the nutrition reference dataset stored in Open AI files
    #[arg(long, env = "OPENAI_DATA_FILE_ID")]
    data_file_id: Option<String>,

    /// Base URL of the Open AI REST API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: Url,

    /// Address to listen on
    #[arg(long, env = "NUTRITRACK_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,

    /// Port number
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Directory to write hourly rotated log files
    #[arg(long, env = "NUTRITRACK_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// OpenTelemetry logs endpoint.
    #[arg(long, env)]
    otel_logs_endpoint: Option<Url>,
}

struct Context {
    config: ChatConfig,
    dataset_cache: DatasetCache,
    openai_client: OpenAiClient,
}

impl GetChatConfig for Context {
    fn get_chat_config(&self) -> &ChatConfig {
        &self.config
    }
}

impl GetDatasetCache for Context {
    fn get_dataset_cache(&self) -> &DatasetCache {
        &self.dataset_cache
    }
}

impl GetFileDataSource for Context {
    type DataSource = OpenAiClient;

    fn get_file_data_source(&self) -> &Self::DataSource {
        &self.openai_client
    }
}

impl GetChatCompletionDataSource for Context {
    type DataSource = OpenAiClient;

    fn get_chat_completion_data_source(&self) -> &Self::DataSource {
        &self.openai_client
    }
}

#[tokio::main]
async fn main() -> Fallible<()> {
    dotenv::dotenv().ok();

    let opt = Opt::parse();

    let _guards = LoggingBuilder::new(env!("CARGO_PKG_NAME"), env!("CARGO_BIN_NAME"))
        .log_dir(opt.log_dir)
        .otel_logs_endpoint(opt.otel_logs_endpoint)
        .init()?;

    info!("hello");

    let config = ChatConfig::new(
        opt.api_key,
        opt.organization_id,
        opt.data_file_id,
        opt.openai_base_url,
    );
    if config.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set. chat requests will fail until it is configured");
    }
    if config.data_file_id.is_none() {
        info!("OPENAI_DATA_FILE_ID is not set. reference dataset is disabled");
    }

    let client = create_client_builder()
        .build()
        .context("failed to build http client")?;
    let context = Arc::new(Context {
        openai_client: OpenAiClient::new(
            client,
            config.base_url.clone(),
            config.organization_id.clone(),
        ),
        dataset_cache: DatasetCache::new(),
        config,
    });

    let listener = TcpListener::bind(SocketAddr::from((opt.host, opt.port)))
        .await
        .with_context(|| format!("failed to bind {}:{}", opt.host, opt.port))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, create_router(context))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("bye");

    Ok(())
}

fn create_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION"),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(?e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut data) => {
                data.recv().await;
            }
            Err(e) => {
                error!(?e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown");
}
