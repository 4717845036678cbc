//! Runs database operations on the shared thread pool.
//!
//! Each op is a type-erased closure over a storage context. The async flavour
//! ships it to the pool and awaits the reply, the blocking flavour calls it in
//! place.

use std::sync::Arc;

use bifrost_db::{errors::DbError, DbResult};
use threadpool::ThreadPool;
use tokio::sync::oneshot;
use tracing::*;

type OpFn<T, R> = dyn Fn(T) -> DbResult<R> + Sync + Send + 'static;

/// One named database operation taking `T` and producing `R`.
pub struct DbOp<T, R> {
    name: &'static str,
    op: Arc<OpFn<T, R>>,
}

impl<T, R> DbOp<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    pub fn new<F>(name: &'static str, op: F) -> Self
    where
        F: Fn(T) -> DbResult<R> + Sync + Send + 'static,
    {
        Self {
            name,
            op: Arc::new(op),
        }
    }

    pub async fn exec_async(&self, pool: &ThreadPool, arg: T) -> DbResult<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let op = self.op.clone();
        let name = self.name;

        pool.execute(move || {
            let res = op(arg);
            if let Err(e) = &res {
                debug!(op = name, err = %e, "db op failed");
            }
            // The caller may have been cancelled meanwhile.
            let _ = reply_tx.send(res);
        });

        reply_rx
            .await
            .map_err(|_| DbError::WorkerDropped(self.name))?
    }

    pub fn exec_blocking(&self, arg: T) -> DbResult<R> {
        (self.op)(arg)
    }
}

/// Generates an ops struct with an `<op>_async` and an `<op>_blocking` method
/// for every listed free function `fn op(ctx: &Context<D>, args..) -> DbResult<ret>`.
macro_rules! inst_ops {
    {
        ($base:ident, $ctx:ident $(<$($tparam:ident: $tpconstr:tt),+>)?) {
            $($iname:ident($($aname:ident: $aty:ty),*) => $ret:ty;)*
        }
    } => {
        pub struct $base {
            pool: ::threadpool::ThreadPool,
            $($iname: $crate::exec::DbOp<($($aty,)*), $ret>,)*
        }

        impl $base {
            pub fn new $(<$($tparam: $tpconstr + Sync + Send + 'static),+>)? (
                pool: ::threadpool::ThreadPool,
                ctx: ::std::sync::Arc<$ctx $(<$($tparam),+>)?>,
            ) -> Self {
                Self {
                    pool,
                    $(
                        $iname: {
                            let ctx = ctx.clone();
                            $crate::exec::DbOp::new(stringify!($iname), move |($($aname,)*)| {
                                $iname(ctx.as_ref(), $($aname),*)
                            })
                        },
                    )*
                }
            }

            ::paste::paste! {
                $(
                    pub async fn [<$iname _async>](&self, $($aname: $aty),*) -> ::bifrost_db::DbResult<$ret> {
                        self.$iname.exec_async(&self.pool, ($($aname,)*)).await
                    }

                    pub fn [<$iname _blocking>](&self, $($aname: $aty),*) -> ::bifrost_db::DbResult<$ret> {
                        self.$iname.exec_blocking(($($aname,)*))
                    }
                )*
            }
        }
    }
}

pub(crate) use inst_ops;
