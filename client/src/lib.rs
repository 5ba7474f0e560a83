mod app;
mod mirror;
mod net;
mod util;
mod ws;

pub use app::BoardClient;
pub use mirror::Mirror;
