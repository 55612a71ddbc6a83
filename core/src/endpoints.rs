//! Endpoint URI templates.
//!
//! Templates are `/`-separated paths relative to the versioned base URL,
//! with `{}` marking positional slots, e.g. `records/{}/{}.json`. Each
//! segment is filled and then percent-encoded as one path segment, so
//! record ids with spaces or slashes cannot change the shape of the path.

use std::collections::HashMap;

use url::Url;

use crate::error::GeoError;

const SLOT: &str = "{}";

/// Operation name to URI template mapping.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    templates: HashMap<String, String>,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl EndpointRegistry {
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Templates for every operation the client exposes.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for (name, template) in [
            ("endpoints", "endpoints.json"),
            ("record", "records/{}/{}.json"),
            ("records", "records/{}.json"),
            ("history", "records/{}/{}/history.json"),
            ("nearby", "records/{}/nearby/{},{}.json"),
            ("nearby_geohash", "records/{}/nearby/{}.json"),
            ("nearby_address", "nearby/address/{},{}.json"),
            ("density_day", "density/{}/{},{}.json"),
            ("density_hour", "density/{}/{}/{},{}.json"),
            ("contains", "contains/{},{}.json"),
            ("overlaps", "overlaps/{},{},{},{}.json"),
            ("boundary", "boundary/{}.json"),
        ] {
            registry.register(name, template);
        }
        registry
    }

    /// Add a template or replace an existing one.
    pub fn register(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    pub fn template(&self, name: &str) -> Result<&str, GeoError> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| GeoError::InvalidRequest(format!("unknown endpoint `{name}`")))
    }

    /// Fill the slots of `name` with `args` and append the result to `base`.
    pub fn resolve(&self, base: &Url, name: &str, args: &[&str]) -> Result<Url, GeoError> {
        let template = self.template(name)?;
        let slots = template.matches(SLOT).count();
        if slots != args.len() {
            return Err(GeoError::InvalidRequest(format!(
                "endpoint `{name}` takes {slots} arguments, got {}",
                args.len()
            )));
        }

        let mut remaining = args.iter();
        let segments: Vec<String> = template
            .split('/')
            .map(|segment| {
                let mut filled = String::with_capacity(segment.len());
                let mut pieces = segment.split(SLOT).peekable();
                while let Some(piece) = pieces.next() {
                    filled.push_str(piece);
                    if pieces.peek().is_some() {
                        if let Some(arg) = remaining.next() {
                            filled.push_str(arg);
                        }
                    }
                }
                filled
            })
            .collect();

        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| GeoError::InvalidRequest(format!("`{base}` cannot be a base URL")))?
            .pop_if_empty()
            .extend(&segments);
        Ok(url)
    }
}
