//! Domain models

pub mod cart;
pub mod order;
pub mod payment;
pub mod product;

pub use cart::{
    AddToCartRequest, Cart, CartItem, CartItemResponse, CartLine, CartResponse,
    UpdateCartItemRequest,
};
pub use order::{
    NewOrderLine, Order, OrderLine, OrderStatus, PlaceOrderResponse, UpdateOrderStatusRequest,
};
pub use payment::{Payment, PaymentEventRequest, PaymentStatus};
pub use product::{Product, ProductCreate, ProductUpdate};
