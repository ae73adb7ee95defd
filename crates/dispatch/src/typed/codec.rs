//! Body decoders and response encoders used by [`TypedHandler`](crate::typed::TypedHandler).
//!
//! The built-ins cover JSON (`application/json` and any `+json` media type) and url-encoded
//! forms; other wire formats plug in by implementing [`Decoder`] or [`Encoder`].

use crate::error::BoxError;
use bytes::Bytes;
use mime::Mime;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Turns a request body of an accepted content type into `R`.
pub trait Decoder<R>: Send + Sync {
    fn accepts(&self, content_type: &Mime) -> bool;

    fn decode(&self, body: &Bytes) -> Result<R, BoxError>;
}

/// Turns `S` into a response body of one media type.
pub trait Encoder<S>: Send + Sync {
    fn media_type(&self) -> &Mime;

    fn encode(&self, value: &S) -> Result<Bytes, BoxError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl<R: DeserializeOwned> Decoder<R> for JsonDecoder {
    fn accepts(&self, content_type: &Mime) -> bool {
        content_type.type_() == mime::APPLICATION
            && (content_type.subtype() == mime::JSON || content_type.suffix() == Some(mime::JSON))
    }

    fn decode(&self, body: &Bytes) -> Result<R, BoxError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Decodes `application/x-www-form-urlencoded` bodies.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormDecoder;

impl<R: DeserializeOwned> Decoder<R> for FormDecoder {
    fn accepts(&self, content_type: &Mime) -> bool {
        content_type.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str()
    }

    fn decode(&self, body: &Bytes) -> Result<R, BoxError> {
        Ok(serde_urlencoded::from_bytes(body)?)
    }
}

/// Encodes with `serde_json`, advertised as `application/json` unless configured otherwise.
#[derive(Debug, Clone)]
pub struct JsonEncoder {
    media_type: Mime,
}

impl JsonEncoder {
    /// Uses a vendor type such as `application/vnd.petstore+json`.
    pub fn with_media_type(media_type: Mime) -> Self {
        Self { media_type }
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self { media_type: mime::APPLICATION_JSON }
    }
}

impl<S: Serialize> Encoder<S> for JsonEncoder {
    fn media_type(&self) -> &Mime {
        &self.media_type
    }

    fn encode(&self, value: &S) -> Result<Bytes, BoxError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }
}
