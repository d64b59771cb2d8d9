// SPDX-License-Identifier: AGPL-3.0-or-later
//! ipsec-tools.conf (setkey script) rendering

use std::fmt;

/// Direction of a security policy relative to the local host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => f.write_str("in"),
            Direction::Out => f.write_str("out"),
        }
    }
}

pub(super) fn write_header(out: &mut String) {
    out.push_str("#!/usr/sbin/setkey -f\n#\n\n");
    out.push_str("flush;\n");
    out.push_str("spdflush;\n\n");
}

/// `spdadd` entry requiring ESP and AH in transport mode from `src` to `dst`
pub(super) fn write_spd(out: &mut String, src: &str, dst: &str, direction: Direction, level: &str) {
    out.push_str(&format!(
        "spdadd {src} {dst} any -P {direction} ipsec\n\
         \tesp/transport//{level}\n\
         \tah/transport//{level};\n\n"
    ));
}
