#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use ferrum_bindpath::{Accessor, Attributes, Bindable, Evaluator, Indexed, Schema};
use num_bigint::BigInt;
use rust_decimal::Decimal;

static EVALUATOR: OnceLock<Evaluator> = OnceLock::new();

/// Shared evaluator with default options
pub fn evaluator() -> &'static Evaluator {
    EVALUATOR.get_or_init(Evaluator::default)
}

pub fn no_attributes() -> Attributes {
    Attributes::new()
}

pub fn date_format(pattern: &str) -> Attributes {
    Attributes::new().with(ferrum_bindpath::attributes::DATE_TIME_FORMAT, pattern)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

impl Bindable for Address {
    fn schema() -> Schema {
        Schema::record::<Self>()
            .field("street", |a| &a.street, |a| &mut a.street)
            .field("city", |a| &a.city, |a| &mut a.city)
            .field("zip", |a| &a.zip, |a| &mut a.zip)
            .build()
    }

    fn construct() -> Option<Self> {
        Some(Self::default())
    }
}

/// Embedded in [`User`]; its members are visible on the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: Option<i64>,
}

impl Bindable for Person {
    fn schema() -> Schema {
        Schema::record::<Self>()
            .field("id", |p| &p.id, |p| &mut p.id)
            .build()
    }

    fn construct() -> Option<Self> {
        Some(Self::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Role {
    Admin,
    Member,
}

impl Bindable for Role {
    fn schema() -> Schema {
        Schema::variants(&[("ADMIN", Role::Admin), ("MEMBER", Role::Member)])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub person: Person,
    pub name: Option<String>,
    pub age: i32,
    pub active: bool,
    pub balance: Option<Decimal>,
    pub big: Option<BigInt>,
    pub birth_date: Option<NaiveDate>,
    pub avatar: Option<PathBuf>,
    pub role: Option<Role>,
    pub initial: Option<char>,
    pub addresses: Option<HashMap<String, Address>>,
    pub security_questions: Option<Box<[String]>>,
    pub lucky_numbers: Option<Vec<i32>>,
    pub scores: Option<BTreeMap<i32, String>>,
    pub nickname: Option<String>,
    pub home: Option<Address>,
}

impl User {
    pub fn nickname(&self) -> Option<String> {
        self.nickname.clone()
    }

    pub fn set_nickname(&mut self, nickname: Option<String>) {
        self.nickname = nickname;
    }

    pub fn display_name(&self) -> Option<String> {
        match (&self.name, &self.nickname) {
            (Some(name), Some(nickname)) => Some(format!("{name} ({nickname})")),
            (Some(name), None) => Some(name.clone()),
            _ => None,
        }
    }

    pub fn home(&self) -> Option<Address> {
        self.home.clone()
    }

    pub fn set_home(&mut self, home: Option<Address>) {
        self.home = home;
    }

    pub fn home_mut(&mut self) -> &mut Option<Address> {
        &mut self.home
    }

    pub fn address(&self, key: &str) -> Option<Address> {
        self.addresses.as_ref()?.get(key).cloned()
    }

    pub fn set_address(&mut self, key: &str, address: Address) {
        self.addresses
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), address);
    }

    pub fn address_mut(&mut self, key: &str) -> Option<&mut Address> {
        self.addresses.as_mut()?.get_mut(key)
    }
}

impl Bindable for User {
    fn schema() -> Schema {
        Schema::record::<Self>()
            .field("name", |u| &u.name, |u| &mut u.name)
            .field("age", |u| &u.age, |u| &mut u.age)
            .field("active", |u| &u.active, |u| &mut u.active)
            .field("balance", |u| &u.balance, |u| &mut u.balance)
            .field("big", |u| &u.big, |u| &mut u.big)
            .field("birthDate", |u| &u.birth_date, |u| &mut u.birth_date)
            .field("avatar", |u| &u.avatar, |u| &mut u.avatar)
            .field("role", |u| &u.role, |u| &mut u.role)
            .field("initial", |u| &u.initial, |u| &mut u.initial)
            .field("addresses", |u| &u.addresses, |u| &mut u.addresses)
            .field(
                "securityQuestions",
                |u| &u.security_questions,
                |u| &mut u.security_questions,
            )
            .field("luckyNumbers", |u| &u.lucky_numbers, |u| &mut u.lucky_numbers)
            .field("scores", |u| &u.scores, |u| &mut u.scores)
            .accessor(Accessor::new("nickname", User::nickname).setter(User::set_nickname))
            .accessor(Accessor::new("displayName", User::display_name))
            .accessor(
                Accessor::new("home", User::home)
                    .setter(User::set_home)
                    .get_mut(User::home_mut),
            )
            .indexed(
                Indexed::new("address", User::address)
                    .setter(User::set_address)
                    .get_mut(User::address_mut),
            )
            .embed(|u| &u.person, |u| &mut u.person)
            .build()
    }

    fn construct() -> Option<Self> {
        Some(Self::default())
    }
}

/// A field and an accessor pair sharing a name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shadowed {
    pub label: Option<String>,
}

impl Shadowed {
    fn label_accessor(&self) -> Option<String> {
        Some("from accessor".to_string())
    }
}

impl Bindable for Shadowed {
    fn schema() -> Schema {
        Schema::record::<Self>()
            .accessor(Accessor::new("label", Shadowed::label_accessor))
            .field("label", |s| &s.label, |s| &mut s.label)
            .build()
    }

    fn construct() -> Option<Self> {
        Some(Self::default())
    }
}

/// Has no zero-argument construction path
#[derive(Debug, Clone, PartialEq)]
pub struct Locked {
    pub code: Option<String>,
}

impl Bindable for Locked {
    fn schema() -> Schema {
        Schema::record::<Self>()
            .field("code", |l| &l.code, |l| &mut l.code)
            .build()
    }
}

/// Root of the test graphs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Action {
    pub user: Option<User>,
    pub users: Option<Vec<User>>,
    pub ids: Option<Vec<i64>>,
    pub tags: Option<Vec<Option<String>>>,
    pub locked: Option<Locked>,
    pub shadowed: Option<Shadowed>,
    pub created: Option<NaiveDateTime>,
}

impl Bindable for Action {
    fn schema() -> Schema {
        Schema::record::<Self>()
            .field("user", |a| &a.user, |a| &mut a.user)
            .field("users", |a| &a.users, |a| &mut a.users)
            .field("ids", |a| &a.ids, |a| &mut a.ids)
            .field("tags", |a| &a.tags, |a| &mut a.tags)
            .field("locked", |a| &a.locked, |a| &mut a.locked)
            .field("shadowed", |a| &a.shadowed, |a| &mut a.shadowed)
            .field("created", |a| &a.created, |a| &mut a.created)
            .build()
    }

    fn construct() -> Option<Self> {
        Some(Self::default())
    }
}

/// Action with a populated user
pub fn action_with_user(name: &str) -> Action {
    Action {
        user: Some(User {
            name: Some(name.to_string()),
            ..User::default()
        }),
        ..Action::default()
    }
}
