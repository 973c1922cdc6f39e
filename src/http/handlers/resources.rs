//! `Resource` implementations binding each store to its HTTP collection.

use super::Resource;
use crate::error::StoreResult;
use crate::filters::{Filters, Metadata, SortColumns};
use crate::http::request::QueryParams;
use crate::http::response::ApiError;
use crate::models::brand::{self, validate_brand, BrandQuery};
use crate::models::brand_model::{self, validate_brand_model, BrandModelQuery};
use crate::models::company::{self, validate_company, CompanyQuery};
use crate::models::rack::{self, validate_rack, RackQuery};
use crate::models::stock::{self, validate_stock, StockQuery};
use crate::models::warehouse::{self, validate_warehouse, WarehouseQuery};
use crate::models::{
    Brand, BrandInput, BrandModel, BrandModelInput, BrandModelStore, BrandStore, Company,
    CompanyInput, CompanyStore, Rack, RackInput, RackStore, StockInput, StockItem, StockStore,
    Warehouse, WarehouseInput, WarehouseStore,
};
use crate::validator::Validator;

/// Numeric ids; anything unparsable cannot exist.
fn parse_serial(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

/// Delegates the store operations of a store keyed by `i64`.
macro_rules! serial_store {
    ($store:ty, $entity:ty, $query:ty) => {
        fn insert(&self, entity: &mut $entity) -> StoreResult<()> {
            <$store>::insert(self, entity)
        }

        fn get(&self, id: &i64) -> StoreResult<$entity> {
            <$store>::get(self, *id)
        }

        fn update(&self, entity: &mut $entity) -> StoreResult<()> {
            <$store>::update(self, entity)
        }

        fn delete(&self, id: &i64) -> StoreResult<()> {
            <$store>::delete(self, *id)
        }

        fn list(&self, query: &$query, filters: &Filters) -> StoreResult<(Vec<$entity>, Metadata)> {
            <$store>::list(self, query, filters)
        }

        fn parse_id(raw: &str) -> Result<i64, ApiError> {
            parse_serial(raw)
        }
    };
}

impl Resource for CompanyStore {
    type Entity = Company;
    type Input = CompanyInput;
    type Query = CompanyQuery;
    type Id = i64;

    const ENVELOPE: &'static str = "perusahaan";
    const NAME: &'static str = "Perusahaan";
    const SORT: SortColumns = company::SORT_COLUMNS;

    serial_store!(CompanyStore, Company, CompanyQuery);

    fn id_of(entity: &Company) -> i64 {
        entity.id
    }

    fn read_query(params: &QueryParams) -> CompanyQuery {
        CompanyQuery {
            name: params.read_string("name", ""),
        }
    }

    fn from_input(input: CompanyInput) -> Company {
        Company::from_input(input)
    }

    fn apply(entity: &mut Company, input: CompanyInput) {
        entity.apply(input)
    }

    fn validate(v: &mut Validator, entity: &Company) {
        validate_company(v, entity)
    }
}

impl Resource for WarehouseStore {
    type Entity = Warehouse;
    type Input = WarehouseInput;
    type Query = WarehouseQuery;
    type Id = i64;

    const ENVELOPE: &'static str = "warehouse";
    const NAME: &'static str = "Warehouse";
    const SORT: SortColumns = warehouse::SORT_COLUMNS;

    serial_store!(WarehouseStore, Warehouse, WarehouseQuery);

    fn id_of(entity: &Warehouse) -> i64 {
        entity.warehouse_id
    }

    fn read_query(params: &QueryParams) -> WarehouseQuery {
        WarehouseQuery {
            name: params.read_string("name", ""),
            alamat: params.read_string("alamat", ""),
        }
    }

    fn from_input(input: WarehouseInput) -> Warehouse {
        Warehouse::from_input(input)
    }

    fn apply(entity: &mut Warehouse, input: WarehouseInput) {
        entity.apply(input)
    }

    fn validate(v: &mut Validator, entity: &Warehouse) {
        validate_warehouse(v, entity)
    }
}

impl Resource for RackStore {
    type Entity = Rack;
    type Input = RackInput;
    type Query = RackQuery;
    type Id = i64;

    const ENVELOPE: &'static str = "rak";
    const NAME: &'static str = "Rak";
    const SORT: SortColumns = rack::SORT_COLUMNS;

    serial_store!(RackStore, Rack, RackQuery);

    fn id_of(entity: &Rack) -> i64 {
        entity.rak_id
    }

    fn read_query(params: &QueryParams) -> RackQuery {
        RackQuery {
            code: params.read_string("code", ""),
            warehousename: params.read_string("warehousename", ""),
            ket: params.read_string("ket", ""),
        }
    }

    fn from_input(input: RackInput) -> Rack {
        Rack::from_input(input)
    }

    fn apply(entity: &mut Rack, input: RackInput) {
        entity.apply(input)
    }

    fn validate(v: &mut Validator, entity: &Rack) {
        validate_rack(v, entity)
    }
}

impl Resource for BrandStore {
    type Entity = Brand;
    type Input = BrandInput;
    type Query = BrandQuery;
    type Id = i64;

    const ENVELOPE: &'static str = "brand";
    const NAME: &'static str = "Brand";
    const SORT: SortColumns = brand::SORT_COLUMNS;

    serial_store!(BrandStore, Brand, BrandQuery);

    fn id_of(entity: &Brand) -> i64 {
        entity.id
    }

    fn read_query(params: &QueryParams) -> BrandQuery {
        BrandQuery {
            name: params.read_string("name", ""),
            ket: params.read_string("ket", ""),
        }
    }

    fn from_input(input: BrandInput) -> Brand {
        Brand::from_input(input)
    }

    fn apply(entity: &mut Brand, input: BrandInput) {
        entity.apply(input)
    }

    fn validate(v: &mut Validator, entity: &Brand) {
        validate_brand(v, entity)
    }
}

impl Resource for BrandModelStore {
    type Entity = BrandModel;
    type Input = BrandModelInput;
    type Query = BrandModelQuery;
    type Id = i64;

    const ENVELOPE: &'static str = "brandasset";
    const NAME: &'static str = "Brand asset";
    const SORT: SortColumns = brand_model::SORT_COLUMNS;

    serial_store!(BrandModelStore, BrandModel, BrandModelQuery);

    fn id_of(entity: &BrandModel) -> i64 {
        entity.id
    }

    fn read_query(params: &QueryParams) -> BrandModelQuery {
        BrandModelQuery {
            name: params.read_string("name", ""),
            ket: params.read_string("ket", ""),
            brandname: params.read_string("brandname", ""),
        }
    }

    fn from_input(input: BrandModelInput) -> BrandModel {
        BrandModel::from_input(input)
    }

    fn apply(entity: &mut BrandModel, input: BrandModelInput) {
        entity.apply(input)
    }

    fn validate(v: &mut Validator, entity: &BrandModel) {
        validate_brand_model(v, entity)
    }
}

impl Resource for StockStore {
    type Entity = StockItem;
    type Input = StockInput;
    type Query = StockQuery;
    type Id = String;

    const ENVELOPE: &'static str = "stok";
    const NAME: &'static str = "Stok";
    const SORT: SortColumns = stock::SORT_COLUMNS;

    fn insert(&self, entity: &mut StockItem) -> StoreResult<()> {
        StockStore::insert(self, entity)
    }

    fn get(&self, id: &String) -> StoreResult<StockItem> {
        StockStore::get(self, id)
    }

    fn update(&self, entity: &mut StockItem) -> StoreResult<()> {
        StockStore::update(self, entity)
    }

    fn delete(&self, id: &String) -> StoreResult<()> {
        StockStore::delete(self, id)
    }

    fn list(&self, query: &StockQuery, filters: &Filters) -> StoreResult<(Vec<StockItem>, Metadata)> {
        StockStore::list(self, query, filters)
    }

    fn parse_id(raw: &str) -> Result<String, ApiError> {
        let id = raw.trim();
        if id.is_empty() {
            return Err(ApiError::NotFound);
        }
        Ok(id.to_string())
    }

    fn id_of(entity: &StockItem) -> String {
        entity.id.clone()
    }

    fn read_query(params: &QueryParams) -> StockQuery {
        StockQuery {
            code: params.read_string("code", ""),
            ket: params.read_string("ket", ""),
            brandname: params.read_string("brandname", ""),
            modelname: params.read_string("modelname", ""),
        }
    }

    fn from_input(input: StockInput) -> StockItem {
        StockItem::from_input(input)
    }

    fn apply(entity: &mut StockItem, input: StockInput) {
        entity.apply(input)
    }

    fn validate(v: &mut Validator, entity: &StockItem) {
        validate_stock(v, entity)
    }
}
