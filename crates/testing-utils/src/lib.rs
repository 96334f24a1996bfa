//! # Silvermoon Testing Utils
//!
//! 工作区共享的测试工具：
//!
//! - **Mock Repositories**: 所有仓储 trait 的内存实现
//! - **Mock Event Bus**: 记录发布历史的内存事件总线
//! - **Mock Reasoning Client**: 按脚本返回的推理客户端
//! - **Test Data Builders**: 带默认值的测试数据构造器
//!
//! ```rust
//! use silvermoon_testing_utils::mocks::*;
//! let repos = in_memory_repositories();
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
