//! Identifier types
//!
//! Every namespace gets its own newtype over `u32`. The value `0` is the
//! invalid sentinel in all of them.

use crc::{CRC_32_ISO_HDLC, Crc};

const ID_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Trigger impl IDs below this value are never handed out by the loader.
pub const TRIGGER_IMPL_ID_NUM_RESERVED: u32 = 100;

/// Name hashed into the ID of the aggregated global auto-load preload request.
pub const GLOBAL_PRELOAD_REQUEST_NAME: &str = "global_atl_preloads";

/// Name of the internal switch selecting the obstruction/occlusion calculation.
pub const OCCLUSION_CALC_SWITCH_NAME: &str = "ObstrOcclCalcType";
pub const OCCLUSION_CALC_IGNORE_STATE_NAME: &str = "Ignore";
pub const OCCLUSION_CALC_SINGLE_RAY_STATE_NAME: &str = "SingleRay";
pub const OCCLUSION_CALC_MULTI_RAY_STATE_NAME: &str = "MultiRay";

/// Parameters fed by the throttled controls update.
pub const DOPPLER_PARAMETER_NAME: &str = "object_doppler";
pub const VELOCITY_PARAMETER_NAME: &str = "object_speed";

macro_rules! atl_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u32);

        impl $name {
            pub const INVALID: Self = Self(0);

            pub fn is_valid(self) -> bool {
                self.0 != 0
            }

            /// Derives the ID from a name, case-insensitively.
            pub fn from_name(name: &str) -> Self {
                Self(string_to_id(name))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

atl_id!(
    /// Audio object handle. Ordinary objects start at the configured minimum.
    ObjectId
);
atl_id!(EventId);
atl_id!(
    /// Standalone file handle, hashed from the file path.
    StandaloneFileId
);
atl_id!(ListenerId);
atl_id!(
    /// Trigger, parameter, switch or environment.
    ControlId
);
atl_id!(SwitchStateId);
atl_id!(PreloadRequestId);
atl_id!(
    /// File-cache entry referenced by a preload request.
    FileEntryId
);
atl_id!(TriggerImplId);
atl_id!(TriggerInstanceId);

/// CRC-32 of the lowercased name.
pub fn string_to_id(name: &str) -> u32 {
    ID_CRC.checksum(name.to_lowercase().as_bytes())
}

pub fn global_preload_request_id() -> PreloadRequestId {
    PreloadRequestId::from_name(GLOBAL_PRELOAD_REQUEST_NAME)
}

pub fn occlusion_calc_switch_id() -> ControlId {
    ControlId::from_name(OCCLUSION_CALC_SWITCH_NAME)
}

pub fn doppler_parameter_id() -> ControlId {
    ControlId::from_name(DOPPLER_PARAMETER_NAME)
}

pub fn velocity_parameter_id() -> ControlId {
    ControlId::from_name(VELOCITY_PARAMETER_NAME)
}
