//! Property tests: mapping A -> B -> A preserves every mapped property.

use mimesis::{MappingConfiguration, Mapper, mappable};
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default, PartialEq)]
struct Address {
    street: String,
    zip: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct AddressRow {
    street: String,
    zip: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Customer {
    id: i64,
    name: String,
    active: bool,
    tags: Vec<String>,
    home: Address,
    previous: Vec<Address>,
    secret: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CustomerRow {
    id: i64,
    name: String,
    active: bool,
    tags: VecDeque<String>,
    home: Address,
    previous: Box<[AddressRow]>,
    secret: String,
}

mappable!(Address { street, zip });
mappable!(AddressRow { street, zip });
mappable!(Customer { id, name, active, tags, home, previous, secret });
mappable!(CustomerRow { id, name, active, tags, home, previous, secret });

fn make_mapper() -> Mapper {
    let mapper = Mapper::new();
    mapper
        .register(MappingConfiguration::builder::<Address, AddressRow>().build())
        .unwrap();
    mapper
        .register(MappingConfiguration::builder::<AddressRow, Address>().build())
        .unwrap();
    mapper
        .register(
            MappingConfiguration::builder::<Customer, CustomerRow>()
                .ignore("secret")
                .build(),
        )
        .unwrap();
    mapper
        .register(MappingConfiguration::builder::<CustomerRow, Customer>().build())
        .unwrap();
    mapper
}

fn address() -> impl Strategy<Value = Address> {
    ("[a-z ]{0,12}", any::<u32>()).prop_map(|(street, zip)| Address { street, zip })
}

fn customer() -> impl Strategy<Value = Customer> {
    (
        any::<i64>(),
        "[A-Za-z]{0,10}",
        any::<bool>(),
        prop::collection::vec("[a-z]{1,6}", 0..5),
        address(),
        prop::collection::vec(address(), 0..4),
        "[a-z]{0,8}",
    )
        .prop_map(|(id, name, active, tags, home, previous, secret)| Customer {
            id,
            name,
            active,
            tags,
            home,
            previous,
            secret,
        })
}

proptest! {
    #[test]
    fn prop_roundtrip_preserves_mapped_properties(source in customer()) {
        let mapper = make_mapper();

        let row: CustomerRow = mapper.map(&source).unwrap();
        let back: Customer = mapper.map(&row).unwrap();

        prop_assert_eq!(&back, &Customer { secret: String::new(), ..source.clone() });
        prop_assert_eq!(row.previous.len(), source.previous.len());
    }
}

proptest! {
    #[test]
    fn prop_mapping_is_deterministic(source in customer()) {
        let mapper = make_mapper();

        let first: CustomerRow = mapper.map(&source).unwrap();
        let second: CustomerRow = mapper.map(&source).unwrap();

        prop_assert_eq!(first, second);
    }
}
