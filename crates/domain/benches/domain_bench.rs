use chrono::Utc;
use common::{CartId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CartItem, CartLine, CartSummary, CartView, Money, NewVariant, Order, Product};

fn catalog(n: usize) -> Vec<Product> {
    (0..n)
        .map(|i| {
            if i % 2 == 0 {
                Product::simple(format!("Mug {i}"), Money::from_units(10_000), 300, 100).unwrap()
            } else {
                Product::with_variants(
                    format!("Shirt {i}"),
                    Money::from_units(150_000),
                    200,
                    vec![
                        NewVariant {
                            color: "Red".into(),
                            size: "M".into(),
                            stock: 50,
                        },
                        NewVariant {
                            color: "Blue".into(),
                            size: "L".into(),
                            stock: 50,
                        },
                    ],
                )
                .unwrap()
            }
        })
        .collect()
}

fn lines_for(cart_id: CartId, products: &[Product]) -> Vec<CartLine> {
    products
        .iter()
        .map(|p| {
            let variant = p.variants().first().map(|v| v.id);
            let item = CartItem::new(cart_id, p.id, variant, 2, "").unwrap();
            CartLine::from_item(&item, p).unwrap()
        })
        .collect()
}

fn bench_cart_summary_100(c: &mut Criterion) {
    let cart_id = CartId::new();
    let products = catalog(100);

    c.bench_function("domain/cart_summary_100_lines", |b| {
        b.iter(|| CartSummary::new(cart_id, lines_for(cart_id, &products)).unwrap());
    });
}

fn bench_place_order_10(c: &mut Criterion) {
    let cart_id = CartId::new();
    let products = catalog(10);
    let summary = CartSummary::new(cart_id, lines_for(cart_id, &products)).unwrap();
    let user = UserId::new();

    c.bench_function("domain/place_order_10_lines", |b| {
        b.iter(|| Order::place(user, &summary.select(None), Utc::now()).unwrap());
    });
}

fn bench_cart_view_cache_round_trip(c: &mut Criterion) {
    let cart_id = CartId::new();
    let view =
        CartView::Items(CartSummary::new(cart_id, lines_for(cart_id, &catalog(20))).unwrap());

    c.bench_function("domain/cart_view_json_round_trip", |b| {
        b.iter(|| {
            let json = serde_json::to_string(&view).unwrap();
            let _: CartView = serde_json::from_str(&json).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_cart_summary_100,
    bench_place_order_10,
    bench_cart_view_cache_round_trip,
);
criterion_main!(benches);
