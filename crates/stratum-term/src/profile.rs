// SPDX-License-Identifier: MIT
//
// Terminal profile — everything known about the terminal after startup.

use crate::caps::Capabilities;
use crate::config::TermConfig;
use crate::detect::{self, Detection, TermKind, TerminalProbe};
use crate::encoding::{Encoder, Encoding};
use crate::error::Result;
use crate::terminfo::{StrCap, TermInfo};

/// Detection result, resolved capabilities and output encoding.
#[derive(Debug, Clone)]
pub struct TermProfile {
    pub detection: Detection,
    pub caps: Capabilities,
    pub encoding: Encoding,
    /// Tab width the terminal uses.
    pub tabstop: usize,
}

impl TermProfile {
    /// Detect the terminal, load its description and choose an encoding.
    ///
    /// # Errors
    ///
    /// Fails when no description exists for the detected terminal type.
    pub fn probe(config: &TermConfig, probe: &mut dyn TerminalProbe) -> Result<Self> {
        let detection = detect::detect(config, probe);
        let info = TermInfo::load(&detection.name, config)?;
        let caps = Capabilities::from_terminfo(&info, detection.kind);
        let encoding = detect::detect_encoding(config, detection.kind, &caps);
        let tabstop = config.tabstop.unwrap_or_else(|| caps.tabstop());
        Ok(Self {
            detection,
            caps,
            encoding,
            tabstop,
        })
    }

    /// Profile for a named terminal without any probing.
    ///
    /// # Errors
    ///
    /// Fails when no description exists for `name`.
    pub fn for_terminal(name: &str, encoding: Encoding) -> Result<Self> {
        let kind = detect::kind_from_name(name);
        let info = TermInfo::load(name, &TermConfig::default())?;
        let caps = Capabilities::from_terminfo(&info, kind);
        Ok(Self::from_parts(name, kind, caps, encoding))
    }

    /// Profile from an already resolved capability set.
    #[must_use]
    pub fn from_parts(name: &str, kind: TermKind, caps: Capabilities, encoding: Encoding) -> Self {
        let tabstop = caps.tabstop();
        Self {
            detection: Detection {
                name: name.to_string(),
                kind,
            },
            caps,
            encoding,
            tabstop,
        }
    }

    /// Glyph encoder for this terminal.
    #[must_use]
    pub fn encoder(&self) -> Encoder {
        Encoder::new(self.encoding, self.caps.get(StrCap::AcsChars))
    }

    #[must_use]
    pub fn kind(&self) -> TermKind {
        self.detection.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.detection.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::NoProbe;
    use std::collections::HashMap;

    #[test]
    fn probe_resolves_builtin_terminal() {
        let vars: HashMap<&str, &str> = [
            ("TERM", "xterm"),
            ("COLORTERM", "truecolor"),
            ("LANG", "C.UTF-8"),
            ("TERMINFO", "/nonexistent"),
            ("STRATUM_TABSTOP", "4"),
        ]
        .into_iter()
        .collect();
        let config = TermConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string()));
        let profile = TermProfile::probe(&config, &mut NoProbe).unwrap();
        assert_eq!(profile.name(), "xterm-256color");
        assert_eq!(profile.caps.max_colors(), 256);
        assert_eq!(profile.encoding, Encoding::Utf8);
        assert_eq!(profile.tabstop, 4);
    }

    #[test]
    fn unknown_terminal_fails() {
        assert!(TermProfile::for_terminal("definitely-not-a-terminal", Encoding::Utf8).is_err());
    }

    #[test]
    fn encoder_uses_acsc() {
        let profile = TermProfile::for_terminal("vt100", Encoding::Vt100).unwrap();
        assert_eq!(profile.encoder().encode(&['─']).bytes, vec![b'q']);
    }
}
