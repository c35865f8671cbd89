//! Coordinate Reference System handling
//!
//! Bund placement works in a projected, metric CRS: spacing, bund length,
//! and the proximity distance are all map units. Only identity checks are
//! needed here; no reprojection is performed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
        }
    }

    /// Parse an authority string such as `EPSG:2193` or a GeoJSON
    /// `urn:ogc:def:crs:EPSG::2193` name. Anything else is kept as WKT.
    pub fn from_authority(name: &str) -> Self {
        let code = name
            .rsplit(':')
            .next()
            .and_then(|tail| tail.trim().parse::<u32>().ok());
        match code {
            Some(code) if name.to_ascii_uppercase().contains("EPSG") => Self::from_epsg(code),
            _ => Self::from_wkt(name),
        }
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // WKT comparison is textual and therefore conservative
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Fail with [`Error::CrsMismatch`] when both layers declare a CRS and the
/// two are not equivalent. An undeclared CRS on either side is accepted.
pub fn ensure_compatible(a: Option<&CRS>, b: Option<&CRS>) -> Result<()> {
    match (a, b) {
        (Some(a), Some(b)) if !a.is_equivalent(b) => {
            Err(Error::CrsMismatch(a.identifier(), b.identifier()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(2193);
        assert_eq!(crs.epsg(), Some(2193));
        assert_eq!(crs.identifier(), "EPSG:2193");
    }

    #[test]
    fn test_from_authority() {
        assert_eq!(CRS::from_authority("EPSG:2193").epsg(), Some(2193));
        assert_eq!(
            CRS::from_authority("urn:ogc:def:crs:EPSG::2193").epsg(),
            Some(2193)
        );
        assert_eq!(CRS::from_authority("LOCAL_CS[\"x\"]").epsg(), None);
    }

    #[test]
    fn test_ensure_compatible() {
        let a = CRS::from_epsg(2193);
        let b = CRS::from_epsg(2193);
        let c = CRS::from_epsg(4326);
        assert!(ensure_compatible(Some(&a), Some(&b)).is_ok());
        assert!(ensure_compatible(Some(&a), None).is_ok());
        assert!(matches!(
            ensure_compatible(Some(&a), Some(&c)),
            Err(Error::CrsMismatch(_, _))
        ));
    }
}
