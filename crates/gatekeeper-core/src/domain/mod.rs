//! 신원 디렉토리 도메인 모델.

mod identity;
mod page;
mod role;

pub use identity::*;
pub use page::*;
pub use role::*;
