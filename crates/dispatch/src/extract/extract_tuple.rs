use crate::container::Container;
use crate::error::DispatchResult;
use crate::extract::from_request::FromRequest;
use crate::Request;

macro_rules! impl_from_request_for_tuple {
    ($($param:ident)*) => {
        impl<$($param,)*> FromRequest for ($($param,)*)
        where
            $($param: FromRequest,)*
        {
            #[inline]
            fn from_request(req: &Request, container: &Container) -> DispatchResult<Self> {
                Ok(($($param::from_request(req, container)?,)*))
            }
        }
    }
}

impl_from_request_for_tuple! { A }
impl_from_request_for_tuple! { A B }
impl_from_request_for_tuple! { A B C }
impl_from_request_for_tuple! { A B C D }
impl_from_request_for_tuple! { A B C D E }
impl_from_request_for_tuple! { A B C D E F }
impl_from_request_for_tuple! { A B C D E F G }
impl_from_request_for_tuple! { A B C D E F G H }
impl_from_request_for_tuple! { A B C D E F G H I }
impl_from_request_for_tuple! { A B C D E F G H I J }
impl_from_request_for_tuple! { A B C D E F G H I J K }
impl_from_request_for_tuple! { A B C D E F G H I J K L }
