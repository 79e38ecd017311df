use std::future::Future;
use std::pin::Pin;

use crate::error::QxError;
use crate::model::QueryOptions;
use crate::providers::openai::{Completion, CompletionRequest, OpenAiService, TextStream};

pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<Completion, QxError>> + 'a>>;
pub type StreamFuture<'a> = Pin<Box<dyn Future<Output = Result<TextStream, QxError>> + 'a>>;

/// Seam between the query handler and the remote model.
pub trait CompletionGateway {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a>;

    fn stream<'a>(&'a self, prompt: &'a str, options: &'a QueryOptions) -> StreamFuture<'a>;
}

impl<T: CompletionGateway + ?Sized> CompletionGateway for &T {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        (**self).complete(request)
    }

    fn stream<'a>(&'a self, prompt: &'a str, options: &'a QueryOptions) -> StreamFuture<'a> {
        (**self).stream(prompt, options)
    }
}

impl CompletionGateway for OpenAiService {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(self.get_completion_with_details(request))
    }

    fn stream<'a>(&'a self, prompt: &'a str, options: &'a QueryOptions) -> StreamFuture<'a> {
        Box::pin(self.query_stream(prompt, options))
    }
}
