pub mod amount;
pub mod asset;
pub mod clock;
pub mod events;
pub mod principal;
pub mod role;

pub use amount::{UsdAmount, BPS_DENOMINATOR, MAX_FEE_BPS, USD_DECIMALS};
pub use asset::AssetId;
pub use clock::Clock;
pub use events::{EngineEvent, EventCallback, EventSink};
pub use principal::{Principal, PrincipalParseError};
pub use role::RoleId;
