mod control;
mod ge;

use crate::{Data, Error};

pub use control::{restart, shutdown};
pub use ge::ge;

pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![ge(), shutdown(), restart()]
}
