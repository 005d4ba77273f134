//! ReferenceQueue port - 到達不能通知のキュー
//!
//! `PhantomRef` が drop されると、その node の key がここに積まれます。
//! worker は `remove(ttl)` で待ち、key を受け取ったら leak として cleanup します。

use std::time::Duration;

use crate::domain::{NodeKey, QueueError};

/// ReferenceQueue は unreachable になった node を worker に届ける
///
/// # Thread Safety
/// - `enqueue` は任意のスレッド（drop が起きたスレッド）から呼ばれる
/// - `remove` は worker だけが呼ぶ
pub trait ReferenceQueue: Send + Sync {
    /// Post a node whose owner became unreachable.
    fn enqueue(&self, key: NodeKey);

    /// Wait up to `timeout` for the next posted node.
    ///
    /// `Ok(None)` means the timeout elapsed with nothing posted.
    fn remove(&self, timeout: Duration) -> Result<Option<NodeKey>, QueueError>;

    /// Wake the current (or next) `remove` with `QueueError::Interrupted`.
    fn interrupt(&self);

    /// Number of posted nodes not yet taken by `remove`.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
