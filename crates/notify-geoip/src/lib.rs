use core::{fmt, net::IpAddr};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use maxminddb::{Reader, geoip2};
use notify_core::{GeoLocation, GeoLocator, GeolocationError};
use tracing::debug;

/// Lookups against a MaxMind City database loaded into memory.
pub struct MaxMindLocator {
    reader: Reader<Vec<u8>>,
    path: PathBuf,
}

impl fmt::Debug for MaxMindLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxMindLocator")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl MaxMindLocator {
    /// # Errors
    ///
    /// Returns an error if the file is missing or not a MaxMind database.
    pub fn open(path: &Path) -> Result<Self, GeolocationError> {
        let reader = Reader::open_readfile(path).map_err(|e| GeolocationError::Open {
            path: path.to_owned(),
            source: Box::new(e),
        })?;
        debug!(
            path = %path.display(),
            db_type = %reader.metadata.database_type,
            "Opened geolocation database"
        );
        Ok(Self {
            reader,
            path: path.to_owned(),
        })
    }
}

fn parse_address(address: &str) -> Result<IpAddr, GeolocationError> {
    address
        .trim()
        .parse()
        .map_err(|_| GeolocationError::InvalidAddress(address.to_owned()))
}

fn english(names: Option<&BTreeMap<&str, &str>>) -> String {
    names
        .and_then(|names| names.get("en"))
        .map(|name| (*name).to_owned())
        .unwrap_or_default()
}

fn location_from(record: &geoip2::City<'_>) -> GeoLocation {
    GeoLocation {
        city: english(record.city.as_ref().and_then(|c| c.names.as_ref())),
        state: english(
            record
                .subdivisions
                .as_ref()
                .and_then(|subs| subs.first())
                .and_then(|s| s.names.as_ref()),
        ),
        country: record
            .country
            .as_ref()
            .and_then(|c| c.iso_code)
            .map(ToOwned::to_owned)
            .unwrap_or_default(),
    }
}

impl GeoLocator for MaxMindLocator {
    fn lookup(&self, address: &str) -> Result<GeoLocation, GeolocationError> {
        let ip = parse_address(address)?;
        let record: geoip2::City<'_> =
            self.reader.lookup(ip).map_err(|e| GeolocationError::Lookup {
                address: address.to_owned(),
                source: Box::new(e),
            })?;
        Ok(location_from(&record))
    }
}
