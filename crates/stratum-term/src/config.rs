// SPDX-License-Identifier: MIT
//
// Environment configuration.
//
// Everything the terminal layer reads from the environment is gathered
// here, once, at startup. Detection, terminfo lookup and encoding choice
// all work from a `TermConfig` value rather than calling `env::var`
// themselves, which keeps them testable without touching the process
// environment.

use std::env;

/// Environment inputs for terminal detection and setup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermConfig {
    /// `TERM`.
    pub term: Option<String>,
    /// `COLORTERM`.
    pub colorterm: Option<String>,
    /// `VTE_VERSION` (GNOME terminal and other VTE users).
    pub vte_version: Option<String>,
    /// `XTERM_VERSION`.
    pub xterm_version: Option<String>,
    /// `ROXTERM_ID`.
    pub roxterm_id: Option<String>,
    /// `KONSOLE_DBUS_SESSION`.
    pub konsole_dbus_session: Option<String>,
    /// `KONSOLE_DCOP`.
    pub konsole_dcop: Option<String>,
    /// `TMUX`.
    pub tmux: Option<String>,
    /// `XTERM_LOCALE`, takes precedence over the regular locale variables.
    pub xterm_locale: Option<String>,
    pub lc_all: Option<String>,
    pub lc_ctype: Option<String>,
    pub lang: Option<String>,
    /// `TERMINFO`, a single database directory searched first.
    pub terminfo: Option<String>,
    /// `TERMINFO_DIRS`, colon-separated list of database directories.
    pub terminfo_dirs: Option<String>,
    pub home: Option<String>,
    /// `STRATUM_ENCODING`: force `utf8`, `vt100`, `pc` or `ascii`.
    pub encoding: Option<String>,
    /// `STRATUM_NO_PROBE=1`: skip the answerback and device-attribute
    /// queries.
    pub no_probe: bool,
    /// `STRATUM_TABSTOP`: override the terminal's tab width.
    pub tabstop: Option<usize>,
    /// `STRATUM_LOG`: file receiving the demo's trace output.
    pub log_file: Option<String>,
}

impl TermConfig {
    /// Read the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary lookup function.
    ///
    /// Empty values are treated as unset, matching how shells commonly
    /// "unset" a variable with `VAR=`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key).and_then(|value| {
                if value.trim().is_empty() {
                    None
                } else {
                    Some(value)
                }
            })
        };

        Self {
            term: get("TERM"),
            colorterm: get("COLORTERM"),
            vte_version: get("VTE_VERSION"),
            xterm_version: get("XTERM_VERSION"),
            roxterm_id: get("ROXTERM_ID"),
            konsole_dbus_session: get("KONSOLE_DBUS_SESSION"),
            konsole_dcop: get("KONSOLE_DCOP"),
            tmux: get("TMUX"),
            xterm_locale: get("XTERM_LOCALE"),
            lc_all: get("LC_ALL"),
            lc_ctype: get("LC_CTYPE"),
            lang: get("LANG"),
            terminfo: get("TERMINFO"),
            terminfo_dirs: get("TERMINFO_DIRS"),
            home: get("HOME"),
            encoding: get("STRATUM_ENCODING"),
            no_probe: get("STRATUM_NO_PROBE").is_some_and(|v| v == "1"),
            tabstop: get("STRATUM_TABSTOP")
                .and_then(|v| v.trim().parse().ok())
                .filter(|&n: &usize| n > 0),
            log_file: get("STRATUM_LOG"),
        }
    }

    /// The effective locale name.
    ///
    /// `XTERM_LOCALE` wins, then the POSIX precedence `LC_ALL`, `LC_CTYPE`,
    /// `LANG`.
    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        self.xterm_locale
            .as_deref()
            .or(self.lc_all.as_deref())
            .or(self.lc_ctype.as_deref())
            .or(self.lang.as_deref())
    }

    /// Whether the locale's codeset is UTF-8.
    #[must_use]
    pub fn is_utf8_locale(&self) -> bool {
        self.locale().is_some_and(|locale| {
            let codeset = locale
                .split_once('.')
                .map_or("", |(_, rest)| rest.split('@').next().unwrap_or(""));
            codeset.eq_ignore_ascii_case("utf-8") || codeset.eq_ignore_ascii_case("utf8")
        })
    }

    /// Whether any of the emulator-identifying variables that imply a
    /// 256-color capable terminal is set.
    #[must_use]
    pub const fn has_color_hint(&self) -> bool {
        self.colorterm.is_some()
            || self.vte_version.is_some()
            || self.xterm_version.is_some()
            || self.roxterm_id.is_some()
            || self.konsole_dbus_session.is_some()
            || self.konsole_dcop.is_some()
    }

    /// Whether the process runs inside KDE Konsole.
    #[must_use]
    pub const fn is_konsole(&self) -> bool {
        self.konsole_dbus_session.is_some() || self.konsole_dcop.is_some()
    }

    /// Whether the process runs inside a VTE based terminal (GNOME).
    #[must_use]
    pub fn is_vte(&self) -> bool {
        self.vte_version.is_some()
            || self
                .colorterm
                .as_deref()
                .is_some_and(|c| c.starts_with("gnome-terminal"))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
