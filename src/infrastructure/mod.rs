//! 基础设施层：页面驱动、元素定位、浏览器会话

pub mod js_executor;
pub mod locator;
pub mod page_driver;
pub mod session;
pub mod storage_state;

pub use js_executor::JsExecutor;
pub use locator::{ElementAction, ElementQuery};
pub use page_driver::PageDriver;
pub use session::{
    AutomationSession, BrowserSession, BrowserSessionFactory, SessionFactory, SessionOptions,
};
pub use storage_state::{storage_state_path, StorageState};
