use std::fmt;
use std::str::FromStr;

/// Vendor code the SDK reports for "no valid setting".
pub const INVALID_PROPERTY_VALUE: i32 = 0xffff_ffff_u32 as i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Iso,
    Aperture,
    ShutterSpeed,
    WhiteBalance,
}

impl Property {
    pub const ALL: [Property; 4] = [
        Property::Iso,
        Property::Aperture,
        Property::ShutterSpeed,
        Property::WhiteBalance,
    ];

    /// Code ↔ text table for this property.
    pub fn mapping(self) -> &'static PropertyMap {
        match self {
            Property::Iso => &ISO,
            Property::Aperture => &APERTURE,
            Property::ShutterSpeed => &SHUTTER_SPEED,
            Property::WhiteBalance => &WHITE_BALANCE,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Property::Iso => "iso",
            Property::Aperture => "aperture",
            Property::ShutterSpeed => "shutter speed",
            Property::WhiteBalance => "white balance",
        })
    }
}

impl FromStr for Property {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iso" => Ok(Property::Iso),
            "aperture" | "av" => Ok(Property::Aperture),
            "shutter" | "shutter-speed" | "tv" => Ok(Property::ShutterSpeed),
            "white-balance" | "wb" => Ok(Property::WhiteBalance),
            other => Err(format!("unknown camera property `{}`", other)),
        }
    }
}

/// Two-way mapping between opaque SDK property codes and the text shown to
/// the operator.
#[derive(Debug)]
pub struct PropertyMap {
    entries: &'static [(i32, &'static str)],
}

impl PropertyMap {
    pub const fn new(entries: &'static [(i32, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn text(&self, code: i32) -> Option<&'static str> {
        self.entries.iter().find(|(c, _)| *c == code).map(|(_, t)| *t)
    }

    pub fn code(&self, text: &str) -> Option<i32> {
        self.entries.iter().find(|(_, t)| *t == text).map(|(c, _)| *c)
    }

    /// Selectable entries, excluding the invalid marker.
    pub fn valid(&self) -> impl Iterator<Item = (i32, &'static str)> + '_ {
        self.entries
            .iter()
            .copied()
            .filter(|(code, _)| *code != INVALID_PROPERTY_VALUE)
    }
}

static ISO: PropertyMap = PropertyMap::new(&[
    (0x00, "Auto"),
    (0x28, "6"),
    (0x30, "12"),
    (0x38, "25"),
    (0x40, "50"),
    (0x48, "100"),
    (0x4b, "125"),
    (0x4d, "160"),
    (0x50, "200"),
    (0x53, "250"),
    (0x55, "320"),
    (0x58, "400"),
    (0x5b, "500"),
    (0x5d, "640"),
    (0x60, "800"),
    (0x63, "1000"),
    (0x65, "1250"),
    (0x68, "1600"),
    (0x70, "3200"),
    (0x78, "6400"),
    (0x80, "12800"),
    (INVALID_PROPERTY_VALUE, "Invalid"),
]);

static APERTURE: PropertyMap = PropertyMap::new(&[
    (0x08, "f/1"),
    (0x0b, "f/1.1"),
    (0x0c, "f/1.2"),
    (0x10, "f/1.4"),
    (0x13, "f/1.6"),
    (0x14, "f/1.8"),
    (0x18, "f/2"),
    (0x1b, "f/2.2"),
    (0x1c, "f/2.5"),
    (0x20, "f/2.8"),
    (0x23, "f/3.2"),
    (0x25, "f/3.5"),
    (0x28, "f/4"),
    (0x2b, "f/4.5"),
    (0x2d, "f/5"),
    (0x30, "f/5.6"),
    (0x33, "f/6.3"),
    (0x35, "f/7.1"),
    (0x38, "f/8"),
    (0x3b, "f/9"),
    (0x3d, "f/10"),
    (0x40, "f/11"),
    (0x43, "f/13"),
    (0x45, "f/14"),
    (0x48, "f/16"),
    (0x4b, "f/18"),
    (0x4d, "f/20"),
    (0x50, "f/22"),
    (0x58, "f/32"),
    (INVALID_PROPERTY_VALUE, "Invalid"),
]);

static SHUTTER_SPEED: PropertyMap = PropertyMap::new(&[
    (0x0c, "Bulb"),
    (0x10, "30\""),
    (0x18, "15\""),
    (0x20, "8\""),
    (0x28, "4\""),
    (0x30, "2\""),
    (0x38, "1\""),
    (0x40, "0\"5"),
    (0x48, "1/4"),
    (0x50, "1/8"),
    (0x53, "1/10"),
    (0x58, "1/15"),
    (0x5d, "1/25"),
    (0x60, "1/30"),
    (0x65, "1/50"),
    (0x68, "1/60"),
    (0x6d, "1/100"),
    (0x70, "1/125"),
    (0x75, "1/200"),
    (0x78, "1/250"),
    (0x80, "1/500"),
    (0x88, "1/1000"),
    (0x90, "1/2000"),
    (0x98, "1/4000"),
    (0xa0, "1/8000"),
    (INVALID_PROPERTY_VALUE, "Invalid"),
]);

static WHITE_BALANCE: PropertyMap = PropertyMap::new(&[
    (0, "Auto"),
    (1, "Daylight"),
    (2, "Cloudy"),
    (3, "Tungsten"),
    (4, "Fluorescent"),
    (5, "Flash"),
    (6, "Manual"),
    (8, "Shade"),
    (9, "Colour temperature"),
    (INVALID_PROPERTY_VALUE, "Invalid"),
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_bidirectional() {
        for property in Property::ALL {
            let map = property.mapping();
            for (code, text) in map.valid() {
                assert_eq!(map.code(text), Some(code));
                assert_eq!(map.text(code), Some(text));
            }
        }
    }

    #[test]
    fn misses_return_none() {
        assert_eq!(Property::Iso.mapping().text(0x7777), None);
        assert_eq!(Property::Aperture.mapping().code("f/0.1"), None);
    }

    #[test]
    fn invalid_marker_is_not_listed() {
        assert!(Property::ShutterSpeed
            .mapping()
            .valid()
            .all(|(code, _)| code != INVALID_PROPERTY_VALUE));
        assert_eq!(Property::Iso.mapping().text(INVALID_PROPERTY_VALUE), Some("Invalid"));
    }

    #[test]
    fn parses_property_names() {
        assert_eq!("ISO".parse(), Ok(Property::Iso));
        assert_eq!("tv".parse(), Ok(Property::ShutterSpeed));
        assert!("zoom".parse::<Property>().is_err());
    }
}
