//! Linux capability sets and their load-time parameter encoding.
//!
//! The module receives the five capability sets of the container as
//! `caps_data=e0,e1,p0,p1,i0,i1 caps_bounding=b0,b1 caps_ambient=a0,a1`,
//! each value one 32-bit word of a set in decimal. The module parses this
//! string itself, so field count, order and separators are fixed.

use std::fmt;
use std::str::FromStr;

use vkernel_common::constants::MAX_CAPABILITY_ID;
use vkernel_common::error::{Result, VKernelError};

/// Kernel names of the capabilities known to this crate, indexed by id.
const NAMES: [&str; 41] = [
    "CAP_CHOWN",
    "CAP_DAC_OVERRIDE",
    "CAP_DAC_READ_SEARCH",
    "CAP_FOWNER",
    "CAP_FSETID",
    "CAP_KILL",
    "CAP_SETGID",
    "CAP_SETUID",
    "CAP_SETPCAP",
    "CAP_LINUX_IMMUTABLE",
    "CAP_NET_BIND_SERVICE",
    "CAP_NET_BROADCAST",
    "CAP_NET_ADMIN",
    "CAP_NET_RAW",
    "CAP_IPC_LOCK",
    "CAP_IPC_OWNER",
    "CAP_SYS_MODULE",
    "CAP_SYS_RAWIO",
    "CAP_SYS_CHROOT",
    "CAP_SYS_PTRACE",
    "CAP_SYS_PACCT",
    "CAP_SYS_ADMIN",
    "CAP_SYS_BOOT",
    "CAP_SYS_NICE",
    "CAP_SYS_RESOURCE",
    "CAP_SYS_TIME",
    "CAP_SYS_TTY_CONFIG",
    "CAP_MKNOD",
    "CAP_LEASE",
    "CAP_AUDIT_WRITE",
    "CAP_AUDIT_CONTROL",
    "CAP_SETFCAP",
    "CAP_MAC_OVERRIDE",
    "CAP_MAC_ADMIN",
    "CAP_SYSLOG",
    "CAP_WAKE_ALARM",
    "CAP_BLOCK_SUSPEND",
    "CAP_AUDIT_READ",
    "CAP_PERFMON",
    "CAP_BPF",
    "CAP_CHECKPOINT_RESTORE",
];

/// A single capability bit, numbered as in the host kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability(u8);

#[allow(missing_docs)]
impl Capability {
    pub const CHOWN: Self = Self(0);
    pub const DAC_OVERRIDE: Self = Self(1);
    pub const DAC_READ_SEARCH: Self = Self(2);
    pub const FOWNER: Self = Self(3);
    pub const FSETID: Self = Self(4);
    pub const KILL: Self = Self(5);
    pub const SETGID: Self = Self(6);
    pub const SETUID: Self = Self(7);
    pub const SETPCAP: Self = Self(8);
    pub const LINUX_IMMUTABLE: Self = Self(9);
    pub const NET_BIND_SERVICE: Self = Self(10);
    pub const NET_BROADCAST: Self = Self(11);
    pub const NET_ADMIN: Self = Self(12);
    pub const NET_RAW: Self = Self(13);
    pub const IPC_LOCK: Self = Self(14);
    pub const IPC_OWNER: Self = Self(15);
    pub const SYS_MODULE: Self = Self(16);
    pub const SYS_RAWIO: Self = Self(17);
    pub const SYS_CHROOT: Self = Self(18);
    pub const SYS_PTRACE: Self = Self(19);
    pub const SYS_PACCT: Self = Self(20);
    pub const SYS_ADMIN: Self = Self(21);
    pub const SYS_BOOT: Self = Self(22);
    pub const SYS_NICE: Self = Self(23);
    pub const SYS_RESOURCE: Self = Self(24);
    pub const SYS_TIME: Self = Self(25);
    pub const SYS_TTY_CONFIG: Self = Self(26);
    pub const MKNOD: Self = Self(27);
    pub const LEASE: Self = Self(28);
    pub const AUDIT_WRITE: Self = Self(29);
    pub const AUDIT_CONTROL: Self = Self(30);
    pub const SETFCAP: Self = Self(31);
    pub const MAC_OVERRIDE: Self = Self(32);
    pub const MAC_ADMIN: Self = Self(33);
    pub const SYSLOG: Self = Self(34);
    pub const WAKE_ALARM: Self = Self(35);
    pub const BLOCK_SUSPEND: Self = Self(36);
    pub const AUDIT_READ: Self = Self(37);
    pub const PERFMON: Self = Self(38);
    pub const BPF: Self = Self(39);
    pub const CHECKPOINT_RESTORE: Self = Self(40);
}

impl Capability {
    /// Highest capability this crate knows a name for.
    pub const LAST: Self = Self::CHECKPOINT_RESTORE;

    /// Capability with bit number `id`.
    ///
    /// # Errors
    ///
    /// Returns [`VKernelError::InvalidCapability`] if `id` exceeds 63, the
    /// last bit the two-word encoding can carry.
    pub fn new(id: u8) -> Result<Self> {
        if id > MAX_CAPABILITY_ID {
            return Err(VKernelError::InvalidCapability {
                value: id.to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Kernel bit number.
    #[must_use]
    pub const fn id(self) -> u8 {
        self.0
    }

    /// Kernel name such as `CAP_SYS_ADMIN`, if known.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        NAMES.get(usize::from(self.0)).copied()
    }

    /// Every capability with a known name, in id order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..=Self::LAST.0).map(Self)
    }

    fn word_and_bit(self) -> (usize, u32) {
        (usize::from(self.0 >> 5), u32::from(self.0 % 32))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for Capability {
    type Err = VKernelError;

    /// Accepts a decimal id or a kernel name, case-insensitively and with
    /// or without the `CAP_` prefix.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u8>() {
            return Self::new(id);
        }
        let upper = s.to_ascii_uppercase();
        let full = if upper.starts_with("CAP_") {
            upper
        } else {
            format!("CAP_{upper}")
        };
        NAMES
            .iter()
            .position(|name| *name == full)
            .and_then(|id| u8::try_from(id).ok())
            .map(Self)
            .ok_or_else(|| VKernelError::InvalidCapability { value: s.to_string() })
    }
}

/// Parses a comma-separated capability list. Empty input is an empty list.
///
/// # Errors
///
/// Returns the first [`VKernelError::InvalidCapability`] encountered.
pub fn parse_list(s: &str) -> Result<Vec<Capability>> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::parse::<Capability>)
        .collect()
}

/// One capability set packed into two 32-bit words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet {
    words: [u32; 2],
}

impl CapabilitySet {
    /// The empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: [0, 0] }
    }

    /// Adds `cap`. Adding a capability twice has no further effect.
    pub fn insert(&mut self, cap: Capability) {
        let (word, bit) = cap.word_and_bit();
        self.words[word] |= 1 << bit;
    }

    /// Whether `cap` is in the set.
    #[must_use]
    pub fn contains(&self, cap: Capability) -> bool {
        let (word, bit) = cap.word_and_bit();
        self.words[word] & (1 << bit) != 0
    }

    /// Whether the set is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.words[0] == 0 && self.words[1] == 0
    }

    /// The packed words, low word first.
    #[must_use]
    pub const fn words(&self) -> [u32; 2] {
        self.words
    }

    /// Members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        (0..=MAX_CAPABILITY_ID)
            .map(Capability)
            .filter(|cap| self.contains(*cap))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<Capability> for CapabilitySet {
    fn extend<I: IntoIterator<Item = Capability>>(&mut self, iter: I) {
        for cap in iter {
            self.insert(cap);
        }
    }
}

impl<'a> FromIterator<&'a Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = &'a Capability>>(iter: I) -> Self {
        iter.into_iter().copied().collect()
    }
}

/// The five capability sets handed to the module at load time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityGroup {
    /// Capabilities currently in effect.
    pub effective: CapabilitySet,
    /// Capabilities that may be made effective.
    pub permitted: CapabilitySet,
    /// Capabilities preserved across `execve`.
    pub inheritable: CapabilitySet,
    /// Upper limit on any other set.
    pub bounding: CapabilitySet,
    /// Capabilities applied without file capabilities.
    pub ambient: CapabilitySet,
}

impl CapabilityGroup {
    /// Capabilities a container receives when nothing else is configured.
    pub const DEFAULT_CONTAINER: [Capability; 14] = [
        Capability::CHOWN,
        Capability::DAC_OVERRIDE,
        Capability::FSETID,
        Capability::FOWNER,
        Capability::MKNOD,
        Capability::NET_RAW,
        Capability::SETGID,
        Capability::SETUID,
        Capability::SETFCAP,
        Capability::SETPCAP,
        Capability::NET_BIND_SERVICE,
        Capability::SYS_CHROOT,
        Capability::KILL,
        Capability::AUDIT_WRITE,
    ];

    /// The default container group: [`Self::DEFAULT_CONTAINER`] in every
    /// set except ambient.
    #[must_use]
    pub fn default_container() -> Self {
        let set: CapabilitySet = Self::DEFAULT_CONTAINER.iter().collect();
        Self {
            effective: set,
            permitted: set,
            inheritable: set,
            bounding: set,
            ambient: CapabilitySet::new(),
        }
    }

    /// The module parameter string for this group.
    #[must_use]
    pub fn to_params(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CapabilityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [e0, e1] = self.effective.words();
        let [p0, p1] = self.permitted.words();
        let [i0, i1] = self.inheritable.words();
        let [b0, b1] = self.bounding.words();
        let [a0, a1] = self.ambient.words();
        write!(
            f,
            "caps_data={e0},{e1},{p0},{p1},{i0},{i1} caps_bounding={b0},{b1} caps_ambient={a0},{a1}"
        )
    }
}

/// Encodes five capability lists into the module parameter string.
#[must_use]
pub fn encode(
    effective: &[Capability],
    permitted: &[Capability],
    inheritable: &[Capability],
    bounding: &[Capability],
    ambient: &[Capability],
) -> String {
    CapabilityGroup {
        effective: effective.iter().collect(),
        permitted: permitted.iter().collect(),
        inheritable: inheritable.iter().collect(),
        bounding: bounding.iter().collect(),
        ambient: ambient.iter().collect(),
    }
    .to_params()
}
