pub mod enums;

mod assignment;
mod doctor_note;
mod identity;
mod message;
mod profile;
mod role_grant;
mod symptom;

pub use assignment::*;
pub use doctor_note::*;
pub use identity::*;
pub use message::*;
pub use profile::*;
pub use role_grant::*;
pub use symptom::*;
