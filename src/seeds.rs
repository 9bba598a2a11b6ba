//! Built-in datasets and challenges that make the service useful without any config.

use crate::dataset::{ColumnDef, ColumnType, Dataset, TableDef};
use crate::domain::{Challenge, ChallengeSource, ExpectedShape, ReferenceSpec, Value};
use crate::normalize::PolicyOverrides;

use ColumnType::{Integer as Int, Real, Text};

fn i(v: i64) -> Value {
  Value::Integer(v)
}

fn r(v: f64) -> Value {
  Value::Real(v)
}

fn t(v: &str) -> Value {
  Value::Text(v.to_string())
}

const NULL: Value = Value::Null;

fn table(name: &str, columns: &[(&str, ColumnType)], rows: Vec<Vec<Value>>) -> TableDef {
  TableDef {
    name: name.into(),
    columns: columns
      .iter()
      .map(|(n, ty)| ColumnDef { name: (*n).into(), column_type: *ty })
      .collect(),
    rows,
  }
}

pub fn seed_datasets() -> Vec<Dataset> {
  vec![titanic(), employees(), movies(), ecommerce()]
}

/// A small slice of the Titanic manifest. One passenger has no recorded class.
pub fn titanic() -> Dataset {
  Dataset {
    id: "titanic".into(),
    title: "Titanic passengers".into(),
    description: "Passenger manifest with class, fare and survival.".into(),
    tables: vec![table(
      "passengers",
      &[
        ("passenger_id", Int),
        ("name", Text),
        ("sex", Text),
        ("age", Real),
        ("pclass", Int),
        ("survived", Int),
        ("fare", Real),
        ("embarked", Text),
      ],
      vec![
        vec![i(1), t("Braund, Mr. Owen Harris"), t("male"), r(22.0), i(3), i(0), r(7.25), t("S")],
        vec![i(2), t("Cumings, Mrs. John Bradley"), t("female"), r(38.0), i(1), i(1), r(71.2833), t("C")],
        vec![i(3), t("Heikkinen, Miss. Laina"), t("female"), r(26.0), i(3), i(1), r(7.925), t("S")],
        vec![i(4), t("Futrelle, Mrs. Jacques Heath"), t("female"), r(35.0), i(1), i(1), r(53.1), t("S")],
        vec![i(5), t("Allen, Mr. William Henry"), t("male"), r(35.0), i(3), i(0), r(8.05), t("S")],
        vec![i(6), t("Moran, Mr. James"), t("male"), NULL, i(3), i(0), r(8.4583), t("Q")],
        vec![i(7), t("McCarthy, Mr. Timothy J"), t("male"), r(54.0), i(1), i(0), r(51.8625), t("S")],
        vec![i(8), t("Palsson, Master. Gosta Leonard"), t("male"), r(2.0), i(3), i(0), r(21.075), t("S")],
        vec![i(9), t("Johnson, Mrs. Oscar W"), t("female"), r(27.0), i(3), i(1), r(11.1333), t("S")],
        vec![i(10), t("Nasser, Mrs. Nicholas"), t("female"), r(14.0), i(2), i(1), r(30.0708), t("C")],
        vec![i(11), t("Sandstrom, Miss. Marguerite Rut"), t("female"), r(4.0), i(3), i(1), r(16.7), t("S")],
        vec![i(12), t("Bonnell, Miss. Elizabeth"), t("female"), r(58.0), i(1), i(1), r(26.55), t("S")],
        vec![i(13), t("Saundercock, Mr. William Henry"), t("male"), r(20.0), i(3), i(0), r(8.05), t("S")],
        vec![i(14), t("Andersson, Mr. Anders Johan"), t("male"), r(39.0), i(3), i(0), r(31.275), t("S")],
        vec![i(15), t("Hewlett, Mrs. Mary D Kingcome"), t("female"), r(55.0), i(2), i(1), r(16.0), t("S")],
        vec![i(16), t("Williams, Mr. Charles Eugene"), t("male"), NULL, i(2), i(1), r(13.0), t("S")],
        vec![i(17), t("Fynney, Mr. Joseph J"), t("male"), r(35.0), i(2), i(0), r(26.0), t("S")],
        vec![i(18), t("Beesley, Mr. Lawrence"), t("male"), r(34.0), i(2), i(1), r(13.0), t("S")],
        vec![i(19), t("Sloper, Mr. William Thompson"), t("male"), r(28.0), i(1), i(1), r(35.5), t("S")],
        vec![i(20), t("Emir, Mr. Farred Chehab"), t("male"), NULL, NULL, i(0), r(7.225), t("C")],
      ],
    )],
  }
}

pub fn employees() -> Dataset {
  Dataset {
    id: "employees".into(),
    title: "Company staff".into(),
    description: "Departments and employees with salaries and managers.".into(),
    tables: vec![
      table(
        "departments",
        &[("id", Int), ("name", Text), ("location", Text)],
        vec![
          vec![i(1), t("Engineering"), t("Berlin")],
          vec![i(2), t("Sales"), t("London")],
          vec![i(3), t("Marketing"), t("London")],
          vec![i(4), t("Research"), t("Zurich")],
        ],
      ),
      table(
        "employees",
        &[
          ("id", Int),
          ("name", Text),
          ("department_id", Int),
          ("title", Text),
          ("salary", Int),
          ("hire_date", Text),
          ("manager_id", Int),
        ],
        vec![
          vec![i(1), t("Grace Hopper"), i(1), t("CTO"), i(185000), t("2015-03-01"), NULL],
          vec![i(2), t("Alan Turing"), i(1), t("Staff Engineer"), i(150000), t("2016-07-15"), i(1)],
          vec![i(3), t("Ada Lovelace"), i(1), t("Engineer"), i(120000), t("2019-01-10"), i(2)],
          vec![i(4), t("Linus Pauling"), i(4), t("Researcher"), i(110000), t("2018-05-20"), i(1)],
          vec![i(5), t("Mary Jackson"), i(2), t("Sales Lead"), i(95000), t("2017-09-01"), NULL],
          vec![i(6), t("Tom Baker"), i(2), t("Account Executive"), i(70000), t("2021-02-14"), i(5)],
          vec![i(7), t("Nina Simone"), i(3), t("Marketing Manager"), i(88000), t("2018-11-30"), NULL],
          vec![i(8), t("Oscar Wilde"), i(3), t("Copywriter"), i(62000), t("2022-06-01"), i(7)],
          vec![i(9), t("Katherine Johnson"), i(1), t("Engineer"), i(118000), t("2020-08-03"), i(2)],
          vec![i(10), t("Rosa Parks"), NULL, t("Contractor"), i(50000), t("2023-01-09"), NULL],
        ],
      ),
    ],
  }
}

pub fn movies() -> Dataset {
  Dataset {
    id: "movies".into(),
    title: "Movies".into(),
    description: "Films with directors, ratings and box office takings (millions USD).".into(),
    tables: vec![
      table(
        "directors",
        &[("id", Int), ("name", Text), ("country", Text)],
        vec![
          vec![i(1), t("Christopher Nolan"), t("UK")],
          vec![i(2), t("Hayao Miyazaki"), t("Japan")],
          vec![i(3), t("Kathryn Bigelow"), t("USA")],
          vec![i(4), t("Bong Joon-ho"), t("South Korea")],
        ],
      ),
      table(
        "movies",
        &[
          ("id", Int),
          ("title", Text),
          ("year", Int),
          ("genre", Text),
          ("director_id", Int),
          ("rating", Real),
          ("box_office", Real),
        ],
        vec![
          vec![i(1), t("Memento"), i(2000), t("Thriller"), i(1), r(8.4), r(40.0)],
          vec![i(2), t("Inception"), i(2010), t("Sci-Fi"), i(1), r(8.8), r(836.8)],
          vec![i(3), t("Spirited Away"), i(2001), t("Animation"), i(2), r(8.6), r(395.8)],
          vec![i(4), t("Princess Mononoke"), i(1997), t("Animation"), i(2), r(8.4), r(170.0)],
          vec![i(5), t("Point Break"), i(1991), t("Action"), i(3), r(7.2), r(83.5)],
          vec![i(6), t("The Hurt Locker"), i(2008), t("War"), i(3), r(7.5), r(49.2)],
          vec![i(7), t("Parasite"), i(2019), t("Thriller"), i(4), r(8.5), r(258.8)],
          vec![i(8), t("Memories of Murder"), i(2003), t("Crime"), i(4), r(8.1), NULL],
          vec![i(9), t("My Neighbor Totoro"), i(1988), t("Animation"), i(2), r(8.1), r(41.0)],
        ],
      ),
    ],
  }
}

pub fn ecommerce() -> Dataset {
  Dataset {
    id: "ecommerce".into(),
    title: "Online shop".into(),
    description: "Customers, products, orders and order lines.".into(),
    tables: vec![
      table(
        "customers",
        &[("id", Int), ("name", Text), ("country", Text), ("signup_date", Text)],
        vec![
          vec![i(1), t("Aiko"), t("Japan"), t("2023-01-04")],
          vec![i(2), t("Bruno"), t("Brazil"), t("2023-02-11")],
          vec![i(3), t("Chloe"), t("France"), t("2023-02-20")],
          vec![i(4), t("Dmitri"), t("Germany"), t("2023-03-08")],
          vec![i(5), t("Esme"), t("France"), t("2023-04-01")],
        ],
      ),
      table(
        "products",
        &[("id", Int), ("name", Text), ("category", Text), ("price", Real)],
        vec![
          vec![i(1), t("Keyboard"), t("Electronics"), r(49.99)],
          vec![i(2), t("Mouse"), t("Electronics"), r(19.5)],
          vec![i(3), t("Desk Lamp"), t("Home"), r(32.0)],
          vec![i(4), t("Notebook"), t("Stationery"), r(3.25)],
          vec![i(5), t("Monitor"), t("Electronics"), r(189.0)],
        ],
      ),
      table(
        "orders",
        &[("id", Int), ("customer_id", Int), ("order_date", Text), ("status", Text)],
        vec![
          vec![i(1), i(1), t("2023-05-01"), t("shipped")],
          vec![i(2), i(2), t("2023-05-03"), t("shipped")],
          vec![i(3), i(1), t("2023-05-10"), t("cancelled")],
          vec![i(4), i(3), t("2023-05-12"), t("shipped")],
          vec![i(5), i(4), t("2023-06-02"), t("pending")],
          vec![i(6), i(3), t("2023-06-15"), t("shipped")],
        ],
      ),
      table(
        "order_items",
        &[("order_id", Int), ("product_id", Int), ("quantity", Int), ("unit_price", Real)],
        vec![
          vec![i(1), i(1), i(1), r(49.99)],
          vec![i(1), i(2), i(2), r(19.5)],
          vec![i(2), i(5), i(1), r(189.0)],
          vec![i(3), i(4), i(10), r(3.25)],
          vec![i(4), i(3), i(1), r(32.0)],
          vec![i(4), i(4), i(4), r(3.25)],
          vec![i(5), i(2), i(1), r(19.5)],
          vec![i(6), i(1), i(1), r(44.99)],
        ],
      ),
    ],
  }
}

fn seed(id: &str, title: &str, difficulty: &str, dataset_id: &str, prompt: &str, reference: ReferenceSpec) -> Challenge {
  Challenge {
    id: id.into(),
    title: title.into(),
    difficulty: difficulty.into(),
    dataset_id: dataset_id.into(),
    prompt: prompt.into(),
    reference,
    policy: PolicyOverrides::default(),
    source: ChallengeSource::Seed,
  }
}

/// Minimal set of built-in challenges over the seed datasets.
pub fn seed_challenges() -> Vec<Challenge> {
  let names_only = PolicyOverrides { ignore_column_names: Some(true), ..Default::default() };
  vec![
    seed(
      "titanic-survivors",
      "Who survived?",
      "easy",
      "titanic",
      "List every column for the passengers who survived.",
      ReferenceSpec::SolutionQuery("SELECT * FROM passengers WHERE survived = 1".into()),
    ),
    Challenge {
      policy: names_only.clone(),
      ..seed(
        "titanic-class-counts",
        "Passengers per class",
        "medium",
        "titanic",
        "For each known passenger class, return the class and the number of passengers in it.",
        ReferenceSpec::SolutionQuery(
          "SELECT pclass, COUNT(*) FROM passengers WHERE pclass IS NOT NULL GROUP BY pclass".into(),
        ),
      )
    },
    seed(
      "employees-top-earners",
      "Top earners",
      "medium",
      "employees",
      "Return the name and salary of the three best-paid employees, highest salary first.",
      ReferenceSpec::SolutionQuery("SELECT name, salary FROM employees ORDER BY salary DESC LIMIT 3".into()),
    ),
    seed(
      "movies-last-century",
      "Last century",
      "easy",
      "movies",
      "Return the title and year of every movie released before 2000, in that column order.",
      ReferenceSpec::ExpectedShape(ExpectedShape {
        columns: Some(vec!["title".into(), "year".into()]),
        row_count: Some(3),
        column_order_matters: true,
        ..Default::default()
      }),
    ),
    Challenge {
      policy: names_only,
      ..seed(
        "ecommerce-customer-revenue",
        "Revenue per customer",
        "hard",
        "ecommerce",
        "For every customer with at least one shipped order, return their name and total spend on shipped orders.",
        ReferenceSpec::SolutionQuery(
          "SELECT c.name, SUM(oi.quantity * oi.unit_price) \
           FROM customers c JOIN orders o ON o.customer_id = c.id \
           JOIN order_items oi ON oi.order_id = o.id \
           WHERE o.status = 'shipped' GROUP BY c.id, c.name"
            .into(),
        ),
      )
    },
  ]
}
