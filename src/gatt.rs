//! Remote GATT database model ([Vol 3] Part G).

pub use {builder::*, consts::*, db::*, stored::*};

mod builder;
mod consts;
mod db;
mod stored;
