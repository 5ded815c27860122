//! Shared fixtures for unit tests.

use larder_types::{Attribute, Record, Value};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Person {
    pub id: u32,
    pub name: String,
    pub age: i64,
    pub city: Option<String>,
}

impl Record for Person {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

impl Person {
    pub fn name() -> Attribute<Person> {
        Attribute::new("name", |p: &Person| Value::from(p.name.as_str()))
    }

    pub fn age() -> Attribute<Person> {
        Attribute::new("age", |p: &Person| Value::from(p.age))
    }

    pub fn city() -> Attribute<Person> {
        Attribute::new("city", |p: &Person| Value::from(p.city.clone()))
    }
}

pub fn person(id: u32, name: &str, age: i64, city: Option<&str>) -> Person {
    Person {
        id,
        name: name.to_string(),
        age,
        city: city.map(str::to_string),
    }
}
