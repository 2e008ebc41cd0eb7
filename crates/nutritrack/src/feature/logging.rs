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

use crate::prelude::*;
use std::env::VarError;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber: stderr output, an optional hourly rolling file and an optional
/// OTLP log exporter.
pub struct LoggingBuilder {
    namespace: &'static str,
    name: &'static str,
    log_dir: Option<PathBuf>,
    #[cfg(feature = "otel")]
    otel_logs_endpoint: Option<url::Url>,
}

impl LoggingBuilder {
    pub fn new(namespace: &'static str, name: &'static str) -> Self {
        Self {
            namespace,
            name,
            log_dir: None,
            #[cfg(feature = "otel")]
            otel_logs_endpoint: None,
        }
    }

    pub fn log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }

    #[cfg(feature = "otel")]
    pub fn otel_logs_endpoint(mut self, endpoint: Option<url::Url>) -> Self {
        self.otel_logs_endpoint = endpoint;
        self
    }

    pub fn init(self) -> Fallible<LoggingGuards> {
        let (file_layer, file_guard) = match &self.log_dir {
            Some(log_dir) => {
                std::fs::create_dir_all(log_dir)
                    .with_context(|| format!("failed to create log dir: {}", log_dir.display()))?;
                let (writer, guard) = tracing_appender::non_blocking(
                    tracing_appender::rolling::hourly(log_dir, self.name),
                );
                let layer = tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        let registry = tracing_subscriber::registry()
            .with(parse_targets(std::env::var("RUST_LOG")))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(file_layer);

        #[cfg(feature = "otel")]
        let logger = match self.otel_logs_endpoint {
            Some(endpoint) => Some(otel::create_logger_provider(
                otel::create_resource(self.namespace, self.name),
                endpoint,
            )?),
            None => None,
        };

        #[cfg(feature = "otel")]
        let registry = registry.with(logger.as_ref().map(|provider| {
            opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(provider)
        }));

        #[cfg(not(feature = "otel"))]
        let _ = self.namespace;

        registry.try_init()?;

        Ok(LoggingGuards {
            _file: file_guard,
            #[cfg(feature = "otel")]
            logger,
        })
    }
}

/// Keeps the background writers alive. Dropping it flushes pending records.
pub struct LoggingGuards {
    _file: Option<WorkerGuard>,
    #[cfg(feature = "otel")]
    logger: Option<opentelemetry_sdk::logs::SdkLoggerProvider>,
}

impl Drop for LoggingGuards {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.force_flush() {
                eprintln!("failed to flush logger: {}", e);
            }
        }
    }
}

fn parse_targets(var: Result<String, VarError>) -> Targets {
    let default_targets = || Targets::new().with_default(FmtSubscriber::DEFAULT_MAX_LEVEL);

    match var {
        Ok(var) => Targets::from_str(&var).unwrap_or_else(|e| {
            eprintln!("Ignoring `RUST_LOG={:?}`: {}", var, e);
            default_targets()
        }),
        Err(VarError::NotPresent) => default_targets(),
        Err(e) => {
            eprintln!("Ignoring `RUST_LOG`: {}", e);
            default_targets()
        }
    }
}

#[cfg(feature = "otel")]
mod otel {
    use crate::prelude::*;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::{LogExporter, WithExportConfig};
    use opentelemetry_sdk::Resource;
    use opentelemetry_sdk::logs::{BatchLogProcessor, SdkLoggerProvider};
    use opentelemetry_semantic_conventions::SCHEMA_URL;
    use opentelemetry_semantic_conventions::attribute::{
        DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_INSTANCE_ID, SERVICE_NAME, SERVICE_NAMESPACE,
        SERVICE_VERSION, TELEMETRY_SDK_LANGUAGE, TELEMETRY_SDK_NAME,
    };
    use url::Url;

    pub(super) fn create_resource(namespace: &'static str, name: &'static str) -> Resource {
        let instance_id = hostname::get()
            .ok()
            .and_then(|data| data.into_string().ok())
            .unwrap_or_else(|| "unknown".into());

        Resource::builder_empty()
            .with_schema_url(
                [
                    KeyValue::new(SERVICE_NAMESPACE, namespace),
                    KeyValue::new(SERVICE_NAME, name),
                    KeyValue::new(SERVICE_INSTANCE_ID, instance_id),
                    KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                    KeyValue::new(
                        DEPLOYMENT_ENVIRONMENT_NAME,
                        if cfg!(debug_assertions) {
                            "debug"
                        } else {
                            "release"
                        },
                    ),
                    KeyValue::new(TELEMETRY_SDK_LANGUAGE, "rust"),
                    KeyValue::new(TELEMETRY_SDK_NAME, "opentelemetry"),
                ],
                SCHEMA_URL,
            )
            .build()
    }

    pub(super) fn create_logger_provider(
        resource: Resource,
        endpoint: Url,
    ) -> Fallible<SdkLoggerProvider> {
        let exporter = LogExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .context("failed to build log exporter")?;

        Ok(SdkLoggerProvider::builder()
            .with_resource(resource)
            .with_log_processor(BatchLogProcessor::builder(exporter).build())
            .build())
    }
}
