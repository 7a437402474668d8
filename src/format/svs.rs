//! Aperio SVS ImageDescription metadata.
//!
//! ```text
//! Aperio Image Library v12.0.5
//! 46000x32914 [0,100 46000x32814] (256x256) JPEG/RGB Q=70|AppMag = 20|MPP = 0.4990
//! ```
//!
//! The first line names the writer; after it come `|`-separated fields,
//! most of them `key = value` pairs.

use std::collections::HashMap;

/// Scan metadata parsed from an SVS ImageDescription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvsMetadata {
    /// Microns per pixel at level 0
    pub mpp: Option<f64>,
    /// Objective magnification
    pub magnification: Option<f64>,
    pub properties: HashMap<String, String>,
}

impl SvsMetadata {
    pub fn parse(description: &str) -> Self {
        let properties: HashMap<String, String> = description
            .split('|')
            .filter_map(|field| field.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        let number = |key: &str| properties.get(key).and_then(|v| v.parse::<f64>().ok());

        SvsMetadata {
            mpp: number("MPP"),
            magnification: number("AppMag"),
            properties,
        }
    }
}
