//! Translation between human-readable setting labels and the opaque codes
//! the device reports. The code values themselves are treated as opaque;
//! only these tables give them meaning.

/// Aperture (Av) codes and their f-number labels.
const APERTURE_TABLE: &[(u32, &str)] = &[
    (0x08, "1.0"),
    (0x0B, "1.1"),
    (0x0C, "1.2"),
    (0x10, "1.4"),
    (0x13, "1.6"),
    (0x14, "1.8"),
    (0x18, "2.0"),
    (0x1B, "2.2"),
    (0x1C, "2.5"),
    (0x20, "2.8"),
    (0x23, "3.2"),
    (0x24, "3.5"),
    (0x28, "4.0"),
    (0x2B, "4.5"),
    (0x2D, "5.0"),
    (0x30, "5.6"),
    (0x33, "6.3"),
    (0x35, "7.1"),
    (0x38, "8.0"),
    (0x3B, "9.0"),
    (0x3D, "10"),
    (0x40, "11"),
    (0x43, "13"),
    (0x45, "14"),
    (0x48, "16"),
    (0x4B, "18"),
    (0x4D, "20"),
    (0x50, "22"),
    (0x53, "25"),
    (0x58, "32"),
];

/// Shutter speed (Tv) codes. `Bulb` is the special mode that takes an
/// operator-supplied exposure duration.
const SHUTTER_TABLE: &[(u32, &str)] = &[
    (0x0C, "Bulb"),
    (0x10, "30\""),
    (0x13, "25\""),
    (0x14, "20\""),
    (0x18, "15\""),
    (0x1B, "13\""),
    (0x1C, "10\""),
    (0x20, "8\""),
    (0x24, "6\""),
    (0x28, "4\""),
    (0x2C, "3\""),
    (0x30, "2\""),
    (0x34, "1\"5"),
    (0x38, "1\""),
    (0x3C, "0\"7"),
    (0x40, "0\"5"),
    (0x44, "0\"3"),
    (0x48, "1/4"),
    (0x4C, "1/6"),
    (0x50, "1/8"),
    (0x54, "1/10"),
    (0x58, "1/15"),
    (0x5C, "1/20"),
    (0x60, "1/30"),
    (0x64, "1/45"),
    (0x68, "1/60"),
    (0x6C, "1/90"),
    (0x70, "1/125"),
    (0x74, "1/180"),
    (0x78, "1/250"),
    (0x7C, "1/350"),
    (0x80, "1/500"),
    (0x84, "1/750"),
    (0x88, "1/1000"),
    (0x8C, "1/1500"),
    (0x90, "1/2000"),
    (0x94, "1/3000"),
    (0x98, "1/4000"),
    (0x9C, "1/6000"),
    (0xA0, "1/8000"),
];

/// ISO speed codes.
const ISO_TABLE: &[(u32, &str)] = &[
    (0x00, "Auto"),
    (0x48, "100"),
    (0x4B, "125"),
    (0x4D, "160"),
    (0x50, "200"),
    (0x53, "250"),
    (0x55, "320"),
    (0x58, "400"),
    (0x60, "800"),
    (0x68, "1600"),
    (0x70, "3200"),
    (0x78, "6400"),
    (0x80, "12800"),
];

/// The eight white-balance modes recognized by the workflow, in fixed
/// selection-index order. Any other device code leaves the control
/// unselected.
const WHITE_BALANCE_TABLE: &[(u32, &str)] = &[
    (0, "Auto"),
    (1, "Daylight"),
    (2, "Cloudy"),
    (3, "Tungsten"),
    (4, "Fluorescent"),
    (5, "Strobe"),
    (6, "White Paper"),
    (8, "Shade"),
];

fn label_for(table: &[(u32, &'static str)], code: u32) -> Option<&'static str> {
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
}

fn code_for(table: &[(u32, &str)], label: &str) -> Option<u32> {
    table.iter().find(|(_, l)| *l == label).map(|(c, _)| *c)
}

pub fn aperture_label(code: u32) -> Option<&'static str> {
    label_for(APERTURE_TABLE, code)
}

pub fn aperture_code(label: &str) -> Option<u32> {
    code_for(APERTURE_TABLE, label)
}

pub fn shutter_label(code: u32) -> Option<&'static str> {
    label_for(SHUTTER_TABLE, code)
}

pub fn shutter_code(label: &str) -> Option<u32> {
    code_for(SHUTTER_TABLE, label)
}

pub fn iso_label(code: u32) -> Option<&'static str> {
    label_for(ISO_TABLE, code)
}

pub fn iso_code(label: &str) -> Option<u32> {
    code_for(ISO_TABLE, label)
}

/// Label of the shutter mode that requires an explicit exposure duration.
pub const BULB_LABEL: &str = "Bulb";

/// White-balance labels in selection-index order.
pub fn white_balance_labels() -> Vec<&'static str> {
    WHITE_BALANCE_TABLE.iter().map(|(_, l)| *l).collect()
}

/// Selection index for a device white-balance code, if it is one of the
/// eight known modes.
pub fn white_balance_index(code: u32) -> Option<usize> {
    WHITE_BALANCE_TABLE.iter().position(|(c, _)| *c == code)
}

/// Device code for a white-balance selection index.
pub fn white_balance_code(index: usize) -> Option<u32> {
    WHITE_BALANCE_TABLE.get(index).map(|(c, _)| *c)
}
