//! spark-labels 过程宏入口。
//!
//! # 设计意图（Why）
//! - 标签值结构体的形状描述与取值写出是纯模板代码，下沉到编译期展开后与结构体定义始终保持一致；
//! - 生成的实现只做字段借用与字符串复制，热路径上没有反射或动态分派。
//!
//! # 集成方式（How）
//! - 业务 crate 依赖 `spark-labels` 后即可书写 `#[derive(spark_labels::LabelValues)]`；
//! - 生成代码使用 `::spark_labels::...` 绝对路径，调用方不需要额外导入。

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Data, DeriveInput, Error, Fields, Ident, LitStr, Type, parse_macro_input, spanned::Spanned,
};

/// 为命名字段结构体派生 `spark_labels::LabelValues`。
///
/// # 语义说明（What）
/// - **输入**：命名字段结构体；`#[label(parent)]` 标记至多一个父层级字段，`#[label(name = "...")]`
///   为普通字段显式声明标签名；
/// - **输出**：`describe_shape` 先展开父层级，再追加本层级字段；`write_labels` 以相同顺序写出；
/// - **前置条件**：父层级字段类型实现 `LabelValues`，普通字段类型实现 `AsRef<str>`。
///
/// # 风险提示（Trade-offs）
/// - 元组结构体、单元结构体与枚举无法确定字段与标签名的对应关系，直接报错。
#[proc_macro_derive(LabelValues, attributes(label))]
pub fn derive_label_values(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_label_values(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

struct LabelField {
    ident: Ident,
    label: Option<LitStr>,
}

struct ParentField {
    ident: Ident,
    ty: Type,
}

fn expand_label_values(input: DeriveInput) -> Result<proc_macro2::TokenStream, Error> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new(
                    other.span(),
                    "#[derive(LabelValues)] 仅支持命名字段结构体",
                ));
            }
        },
        _ => {
            return Err(Error::new(
                input.ident.span(),
                "#[derive(LabelValues)] 仅支持结构体",
            ));
        }
    };

    let mut parent: Option<ParentField> = None;
    let mut labels = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let (is_parent, label) = parse_field_attrs(field)?;
        if is_parent {
            if parent.is_some() {
                return Err(Error::new(
                    field.span(),
                    "#[derive(LabelValues)] 至多允许一个 #[label(parent)] 字段",
                ));
            }
            parent = Some(ParentField {
                ident,
                ty: field.ty.clone(),
            });
        } else {
            labels.push(LabelField { ident, label });
        }
    }

    let struct_ident = &input.ident;
    let type_name = LitStr::new(&struct_ident.to_string(), struct_ident.span());
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let describe_parent = parent.as_ref().map(|parent| {
        let ty = &parent.ty;
        quote! { <#ty as ::spark_labels::LabelValues>::describe_shape(shape); }
    });
    let write_parent = parent.as_ref().map(|parent| {
        let ident = &parent.ident;
        quote! { ::spark_labels::LabelValues::write_labels(&self.#ident, writer); }
    });

    let field_labels = labels.iter().map(|field| {
        let name = LitStr::new(&field.ident.to_string(), field.ident.span());
        match &field.label {
            Some(label) => quote! { ::spark_labels::FieldLabel::named(#name, #label) },
            None => quote! { ::spark_labels::FieldLabel::positional(#name) },
        }
    });
    let field_idents = labels.iter().map(|field| &field.ident);

    Ok(quote! {
        impl #impl_generics ::spark_labels::LabelValues for #struct_ident #ty_generics #where_clause {
            fn describe_shape(shape: &mut ::spark_labels::LabelShape) {
                #describe_parent
                shape.push_level(#type_name, &[#(#field_labels),*]);
            }

            fn write_labels(&self, writer: &mut ::spark_labels::LabelWriter<'_>) {
                #write_parent
                #(writer.push(::core::convert::AsRef::<str>::as_ref(&self.#field_idents));)*
            }
        }
    })
}

fn parse_field_attrs(field: &syn::Field) -> Result<(bool, Option<LitStr>), Error> {
    let mut is_parent = false;
    let mut label = None;
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("label")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("parent") {
                is_parent = true;
                Ok(())
            } else if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("#[label(name = ...)] 不能为空字符串"));
                }
                label = Some(value);
                Ok(())
            } else {
                Err(meta.error("#[label(...)] 仅支持 `parent` 与 `name = \"...\"`"))
            }
        })?;
    }
    if is_parent && label.is_some() {
        return Err(Error::new(
            field.span(),
            "#[label(parent)] 字段不能同时声明 name",
        ));
    }
    Ok((is_parent, label))
}
