pub mod colors;
pub mod descriptor;
pub mod region;
pub mod snapshot;

pub use colors::faction_color;
pub use descriptor::*;
pub use region::*;
pub use snapshot::*;
