use anyhow::Result;

use crate::geo_point::GeoPoint;

// https://developers.google.com/maps/documentation/utilities/polylinealgorithm
// OSRM uses precision 5 by default (`geometries=polyline`), 6 for `polyline6`.
pub const DEFAULT_PRECISION: u32 = 5;

fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = match bytes.get(*index) {
            Some(b) => *b,
            None => bail!("truncated polyline at byte {}", *index),
        };
        if !(63..=126).contains(&byte) {
            bail!("invalid polyline character {:?} at byte {}", byte as char, *index);
        }
        *index += 1;
        let chunk = (byte - 63) as i64;
        if shift > 60 {
            bail!("polyline value overflow at byte {}", *index);
        }
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

pub fn decode(encoded: &str, precision: u32) -> Result<Vec<GeoPoint>> {
    let factor = 10_f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut points = Vec::new();
    while index < bytes.len() {
        let offset = index;
        lat = match lat.checked_add(next_value(bytes, &mut index)?) {
            Some(v) => v,
            None => bail!("polyline latitude overflow at byte {}", offset),
        };
        lng = match lng.checked_add(next_value(bytes, &mut index)?) {
            Some(v) => v,
            None => bail!("polyline longitude overflow at byte {}", offset),
        };
        points.push(GeoPoint::new(lat as f64 / factor, lng as f64 / factor));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reference_polyline() {
        let points = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@", DEFAULT_PRECISION).unwrap();
        let expected = [(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];
        assert_eq!(points.len(), expected.len());
        for (p, (lat, lng)) in points.iter().zip(expected) {
            assert!(p.approx_eq(&GeoPoint::new(lat, lng), 1e-9), "{:?}", p);
        }
    }

    #[test]
    fn decode_empty() {
        assert!(decode("", DEFAULT_PRECISION).unwrap().is_empty());
    }

    #[test]
    fn decode_precision_6() {
        // (38.5, -120.2) encoded with precision 6
        let points = decode("_izlhA~rlgdF", 6).unwrap();
        assert_eq!(points.len(), 1);
        assert!(points[0].approx_eq(&GeoPoint::new(38.5, -120.2), 1e-9));
    }

    #[test]
    fn decode_overflow_is_an_error() {
        let encoded = "}~~~~~~~~~~~E?".repeat(3);
        assert!(decode(&encoded, DEFAULT_PRECISION).is_err());
    }

    #[test]
    fn decode_truncated() {
        assert!(decode("_p~iF", DEFAULT_PRECISION).is_err());
        assert!(decode("_p~iF~ps|U_", DEFAULT_PRECISION).is_err());
        assert!(decode("_p~iF ps|U", DEFAULT_PRECISION).is_err());
    }
}
