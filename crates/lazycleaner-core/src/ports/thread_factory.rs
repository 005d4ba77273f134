//! ThreadFactory port - worker の起動方法
//!
//! worker は必要になった時にだけ起動され、idle になると自分で終了します。
//! そのため factory は何度でも呼ばれる可能性があります。

use std::io;

/// Work handed to a factory. Runs the worker loop to completion.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// ThreadFactory は worker を走らせる実行コンテキストを用意する
///
/// # 契約
/// - `job` を別スレッド（またはそれに相当するもの）で実行する
/// - 実行の完了を待たない。呼び出し側は join しない
/// - 生成できなかった場合は `Err` を返す（register の呼び出し元に伝わる）
/// - `Ok` を返してから `job` を実行せずに drop してもよい。cleaner は running
///   フラグを戻し、次の登録で再度 spawn する
///
/// Closures of the shape `Fn(Job) -> io::Result<()>` implement this trait.
pub trait ThreadFactory: Send + Sync {
    fn spawn(&self, job: Job) -> io::Result<()>;
}

impl<F> ThreadFactory for F
where
    F: Fn(Job) -> io::Result<()> + Send + Sync,
{
    fn spawn(&self, job: Job) -> io::Result<()> {
        self(job)
    }
}
