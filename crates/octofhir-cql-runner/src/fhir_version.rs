//! FHIR version detection from CQL source

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static FHIR_VERSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"using (FHIR|"FHIR") version '(\d(.|\d)*)'"#).expect("valid FHIR version regex")
});

/// FHIR release used by a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FhirVersion {
    Dstu2,
    Dstu3,
    #[default]
    R4,
    R5,
}

impl FhirVersion {
    /// Release tag passed to the engine
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Dstu2 => "DSTU2",
            Self::Dstu3 => "DSTU3",
            Self::R4 => "R4",
            Self::R5 => "R5",
        }
    }

    /// Map a declared model version (e.g. `4.0.1`) to its release by leading digit
    pub fn from_model_version(version: &str) -> Option<Self> {
        match version.chars().next()? {
            '2' => Some(Self::Dstu2),
            '3' => Some(Self::Dstu3),
            '4' => Some(Self::R4),
            '5' => Some(Self::R5),
            _ => None,
        }
    }

    /// Find the `using FHIR version '...'` declaration in CQL source
    pub fn detect(source: &str) -> Option<Self> {
        let captures = FHIR_VERSION_REGEX.captures(source)?;
        Self::from_model_version(captures.get(2)?.as_str())
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for FhirVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DSTU2" => Ok(Self::Dstu2),
            "DSTU3" => Ok(Self::Dstu3),
            "R4" => Ok(Self::R4),
            "R5" => Ok(Self::R5),
            other => Err(format!("Unknown FHIR version: {}", other)),
        }
    }
}
