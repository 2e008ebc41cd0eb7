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

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::dispatcher::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// Captures log lines of the current thread until the guard is dropped.
pub fn init_tracing() -> (DefaultGuard, LogWriter) {
    let writer = LogWriter::new();
    let guard = tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_writer(writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_target(false)
            .without_time()
            .with_ansi(false)
            .finish(),
    );

    (guard, writer)
}

#[derive(Clone)]
pub struct LogWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogWriter {
    fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn remove(&self) -> String {
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        let string = String::from_utf8_lossy(&buf).into_owned();
        buf.clear();
        string
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
