//! the responder's contract with the core.
//!
//! the responder itself — application routing and handling — is an explicit
//! non-goal of this crate; only the shape of the call it must answer lives
//! here.

use std::{future::Future, rc::Rc, sync::Arc};

/// `Fn(Req) -> impl Future<Output = Result<Response, Error>>` expressed as a
/// trait. uses return-position `impl Future` rather than the teacher's GAT
/// future, which keeps call sites plain at the cost of dyn-compatibility —
/// the connection handler is generic over its responder rather than boxing
/// it (see DESIGN.md).
pub trait Service<Req> {
    type Response;
    type Error;

    fn call(&self, req: Req) -> impl Future<Output = Result<Self::Response, Self::Error>>;
}

impl<F, Req, Fut, Res, Err> Service<Req> for F
where
    F: Fn(Req) -> Fut,
    Fut: Future<Output = Result<Res, Err>>,
{
    type Response = Res;
    type Error = Err;

    fn call(&self, req: Req) -> Fut {
        (self)(req)
    }
}

macro_rules! impl_alloc {
    ($alloc:ident) => {
        impl<S, Req> Service<Req> for $alloc<S>
        where
            S: Service<Req> + ?Sized,
        {
            type Response = S::Response;
            type Error = S::Error;

            fn call(&self, req: Req) -> impl Future<Output = Result<Self::Response, Self::Error>> {
                (**self).call(req)
            }
        }
    };
}

impl_alloc!(Box);
impl_alloc!(Rc);
impl_alloc!(Arc);

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Service<u32> for Echo {
        type Response = u32;
        type Error = std::convert::Infallible;

        async fn call(&self, req: u32) -> Result<u32, Self::Error> {
            Ok(req)
        }
    }

    #[tokio::test]
    async fn boxed_service_forwards_call() {
        let svc = Box::new(Echo);
        assert_eq!(svc.call(7).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn closure_impls_service() {
        let svc = |req: u32| async move { Ok::<_, std::convert::Infallible>(req * 2) };
        assert_eq!(svc.call(3).await.unwrap(), 6);
    }
}
