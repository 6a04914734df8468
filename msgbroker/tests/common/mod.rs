//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Envelope shared by the integration tests.

#![allow(dead_code)]

use msgbroker::{Broker, HandlerError, MessageEnvelope};
use msgbroker::stream::MemoryStream;
use std::any::{Any, TypeId};

#[derive(Debug, Default)]
pub struct Envelope {
    pub request_id: String,
    pub error: Option<String>,
    pub progress: Option<String>,
    pub body: Body,
}

#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    Add(Add),
    Echo(Echo),
    Import(Import),
    Sum(i64),
    Text(String),
}

#[derive(Debug)]
pub struct Add {
    pub a: i64,
    pub b: i64,
}

#[derive(Debug)]
pub struct Echo(pub String);

#[derive(Debug)]
pub struct Import {
    pub steps: u32,
}

impl Envelope {
    pub fn new(request_id: &str, body: Body) -> Self {
        Self {
            request_id: request_id.to_string(),
            body,
            ..Default::default()
        }
    }

    pub fn sum(&self) -> Option<i64> {
        match self.body {
            Body::Sum(sum) => Some(sum),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }
}

pub struct Ops;

impl MessageEnvelope<Envelope> for Ops {
    fn request_id(&self, msg: &Envelope) -> String {
        msg.request_id.clone()
    }

    fn set_request_id(&self, msg: &mut Envelope, id: &str) {
        msg.request_id = id.to_string();
    }

    fn error(&self, msg: &Envelope) -> Option<HandlerError> {
        msg.error.clone().map(Into::into)
    }

    fn set_error(&self, msg: &mut Envelope, err: &HandlerError) {
        msg.error = Some(err.to_string());
    }

    fn into_inner_message(&self, msg: Envelope) -> Option<Box<dyn Any + Send>> {
        match msg.body {
            Body::Add(add) => Some(Box::new(add)),
            Body::Echo(echo) => Some(Box::new(echo)),
            Body::Import(import) => Some(Box::new(import)),
            Body::Empty | Body::Sum(_) | Body::Text(_) => None,
        }
    }

    fn is_progress_message(&self, msg: &Envelope) -> bool {
        msg.progress.is_some()
    }

    fn progress_message(&self, msg: &Envelope) -> String {
        msg.progress.clone().unwrap_or_default()
    }

    fn create_progress_message(&self, request_id: &str, message: &str) -> Envelope {
        Envelope {
            request_id: request_id.to_string(),
            progress: Some(message.to_string()),
            ..Default::default()
        }
    }

    fn accepts_request_type(&self, type_id: TypeId) -> bool {
        type_id == TypeId::of::<Add>()
            || type_id == TypeId::of::<Echo>()
            || type_id == TypeId::of::<Import>()
    }
}

/// Two brokers connected back to back over an in-memory stream.
pub fn connected_pair(buffer_size: usize) -> (Broker<Envelope>, Broker<Envelope>) {
    let (left, right) = MemoryStream::pair(buffer_size);
    (Broker::from_stream(left, Ops), Broker::from_stream(right, Ops))
}

/// Registers the arithmetic and progress handlers used across the tests.
pub fn serve_all(broker: &Broker<Envelope>) {
    broker
        .on(|_ctx, add: Add| async move {
            match add.a.checked_add(add.b) {
                Some(sum) => Ok(Some(Envelope::new("", Body::Sum(sum)))),
                None => Err("overflow".into()),
            }
        })
        .expect("register add");
    broker
        .on(|_ctx, echo: Echo| async move { Ok(Some(Envelope::new("", Body::Text(echo.0)))) })
        .expect("register echo");
    broker
        .on_with_progress(|_ctx, import: Import, progress| async move {
            for step in 1..=import.steps {
                progress.report(&format!("step {}/{}", step, import.steps));
            }
            Ok(Some(Envelope::new("", Body::Text("imported".to_string()))))
        })
        .expect("register import");
}
